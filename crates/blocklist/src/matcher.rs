/// Node in the trie structure, representing a blocklist entry.
#[derive(Debug, Clone, Default)]
struct Node {
    label: Box<str>,
    /// `*.label`: every name below this node is blocked.
    wildcard: bool,
    /// `label`: this name and every name below it is blocked.
    blocked: bool,
    children: Vec<Node>,
}

impl Node {
    fn new(label: &str) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    fn child(&self, label: &str) -> Option<&Node> {
        self.children
            .binary_search_by(|n| n.label.as_ref().cmp(label))
            .ok()
            .map(|i| &self.children[i])
    }

    fn child_mut(&mut self, label: &str) -> &mut Node {
        match self.children.binary_search_by(|n| n.label.as_ref().cmp(label)) {
            Ok(i) => &mut self.children[i],
            Err(i) => {
                self.children.insert(i, Node::new(label));
                &mut self.children[i]
            }
        }
    }
}

/// Trie implementation of a blocklist matcher, keyed by reversed labels.
#[derive(Debug, Clone, Default)]
pub struct BlocklistMatcher {
    root: Node,
    len: usize,
}

impl BlocklistMatcher {
    /// Check if a given domain name is blocked.
    pub fn is_blocked(&self, name: &str) -> bool {
        let Ok(labels) = normalize_to_rev_labels(name) else {
            return false;
        };

        let mut node = &self.root;

        for label in labels {
            if node.blocked || node.wildcard {
                return true;
            }

            match node.child(&label) {
                Some(next) => node = next,
                None => return false,
            }
        }

        node.blocked
    }

    /// Number of entries loaded into the matcher.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Add a single pattern, either `domain` or `*.domain`.
    pub fn insert(&mut self, pattern: &str) -> anyhow::Result<()> {
        let pattern = pattern.trim();

        let (is_wildcard, name) = match pattern.strip_prefix("*.") {
            Some(rest) => (true, rest),
            None => (false, pattern),
        };

        let labels = normalize_to_rev_labels(name)?;
        if labels.is_empty() {
            anyhow::bail!("empty domain pattern");
        }

        let mut node = &mut self.root;
        for label in labels {
            node = node.child_mut(&label);
        }

        if is_wildcard {
            node.wildcard = true;
        } else {
            node.blocked = true;
        }
        self.len += 1;

        Ok(())
    }
}

/// Normalize to reverse labels:
/// "Ads.Example.COM." -> ["com","example","ads"]
fn normalize_to_rev_labels(input: &str) -> anyhow::Result<Vec<String>> {
    let s = input.trim().trim_end_matches('.').to_ascii_lowercase();

    let ascii = idna::domain_to_ascii(&s).map_err(|_| anyhow::anyhow!("invalid domain: {}", input))?;

    if ascii.split('.').any(|l| l.is_empty() || l == "*") && !ascii.is_empty() {
        anyhow::bail!("invalid domain: {}", input);
    }

    let mut labels: Vec<String> = ascii.split('.').filter(|l| !l.is_empty()).map(str::to_string).collect();

    labels.reverse();
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(patterns: &[&str]) -> anyhow::Result<BlocklistMatcher> {
        let mut matcher = BlocklistMatcher::default();
        for pattern in patterns {
            matcher.insert(pattern)?;
        }
        Ok(matcher)
    }

    #[test]
    fn test_blocked_patterns() {
        let matcher = matcher(&["google.com", "yahoo.com", "*.bla.com"]).unwrap();
        assert_eq!(matcher.len(), 3);

        assert!(matcher.is_blocked("google.com"));
        assert!(matcher.is_blocked("YAHOO.com."));
        assert!(matcher.is_blocked("a.bla.com"));
        assert!(!matcher.is_blocked("bla.com"));
        assert!(!matcher.is_blocked("example.com"));
    }

    #[test]
    fn test_plain_entry_blocks_subdomains() {
        let matcher = matcher(&["ads.example.com"]).unwrap();

        assert!(matcher.is_blocked("ads.example.com"));
        assert!(matcher.is_blocked("tracker.ads.example.com"));
        assert!(!matcher.is_blocked("example.com"));
        assert!(!matcher.is_blocked("notads.example.com"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matcher(&["a..b"]).is_err());
        assert!(matcher(&["foo.*.com"]).is_err());
        assert!(matcher(&["  "]).is_err());
    }
}
