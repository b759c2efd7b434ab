//! Small helpers shared across the deployment pipeline.

use crate::types::LabelMeta;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::Rng;
use std::collections::HashMap;

const IDENT_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Random lower-alnum token, used for process idents and name suffixes.
pub fn random_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length).map(|_| IDENT_CHARSET[rng.gen_range(0..IDENT_CHARSET.len())] as char).collect()
}

/// Container name wire format: `<app>_<entrypoint>_<suffix>`.
pub fn make_container_name(appname: &str, entrypoint: &str, suffix: &str) -> String {
    format!("{}_{}_{}", appname, entrypoint, suffix)
}

/// Split a command line into arguments, honoring single and double quotes
/// and collapsing unquoted whitespace.
pub fn make_command_line_args(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in command.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

/// Encode publish/health metadata for the mandatory meta label.
pub fn encode_meta_in_label(meta: &LabelMeta) -> String {
    // LabelMeta serialization cannot fail: all fields are plain data
    let json = serde_json::to_vec(meta).unwrap_or_default();
    STANDARD.encode(json)
}

/// Decode the meta label back into publish/health metadata.
pub fn decode_meta_in_label(encoded: &str) -> Option<LabelMeta> {
    let json = STANDARD.decode(encoded).ok()?;
    serde_json::from_slice(&json).ok()
}

/// Derive the publish map from a container's networks and the entrypoint's
/// published ports: network name to "address:port" entries.
pub fn make_publish_info(
    networks: &HashMap<String, String>,
    publish: &[String],
) -> HashMap<String, Vec<String>> {
    let mut result = HashMap::new();
    for (name, address) in networks {
        let entries = publish
            .iter()
            .map(|port| {
                let port = port.split('/').next().unwrap_or(port);
                format!("{}:{}", address, port)
            })
            .collect();
        result.insert(name.clone(), entries);
    }
    result
}
