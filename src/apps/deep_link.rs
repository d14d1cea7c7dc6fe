use super::LinkError;

const SCHEME: &str = "brightid://";
const LINK_VERIFICATION: &str = "link-verification";

/// `brightid://link-verification/<node url>/<context>/<account id>`
///
/// The node url is percent-encoded because it contains slashes of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLink {
    pub node_url: String,
    pub context: String,
    pub account_id: String,
}

impl DeepLink {
    pub fn parse(link: &str) -> Result<Self, LinkError> {
        let rest = link
            .trim()
            .strip_prefix(SCHEME)
            .ok_or_else(|| LinkError::InvalidLink(format!("not a brightid link: {}", link)))?;

        let parts: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
        let [action, host, context, account_id] = parts.as_slice() else {
            return Err(LinkError::InvalidLink(format!("expected 4 path segments in {}", link)));
        };

        if *action != LINK_VERIFICATION {
            return Err(LinkError::InvalidLink(format!("unsupported action {}", action)));
        }

        let node_url = decode(host)?;
        let context = decode(context)?;
        let account_id = decode(account_id)?;
        if node_url.is_empty() || context.is_empty() || account_id.is_empty() {
            return Err(LinkError::InvalidLink(format!("empty segment in {}", link)));
        }

        Ok(Self {
            node_url,
            context,
            account_id,
        })
    }
}

fn decode(segment: &str) -> Result<String, LinkError> {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .map_err(|e| LinkError::InvalidLink(e.to_string()))
}
