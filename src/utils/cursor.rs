use base64::{engine::general_purpose, Engine as _};

/// Resume-cursor helpers: encode/decode an (account, paging_token) pair into
/// an opaque base64 string. Binding the account into the cursor lets the
/// operations endpoint reject a token replayed against a different account.
/// Format used internally: "{account}|{paging_token}" then base64 encoded.
pub fn encode(account: &str, paging_token: &str) -> String {
    let s = format!("{}|{}", account, paging_token);
    general_purpose::STANDARD.encode(s)
}

pub fn decode(cursor: &str) -> Result<(String, String), String> {
    let decoded = general_purpose::STANDARD
        .decode(cursor)
        .map_err(|e| format!("base64 decode error: {}", e))?;
    let s = String::from_utf8(decoded).map_err(|e| format!("utf8 error: {}", e))?;
    let mut parts = s.splitn(2, '|');
    let account = parts
        .next()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| "missing account in cursor".to_string())?;
    let token = parts
        .next()
        .ok_or_else(|| "missing paging token in cursor".to_string())?;
    Ok((account.to_string(), token.to_string()))
}
