use std::collections::HashSet;

/// Upstream hostnames the relay may contact. Built once, never mutated.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    hosts: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|host| host.as_ref().trim().to_ascii_lowercase())
                .filter(|host| !host.is_empty())
                .collect(),
        }
    }

    /// Exact match, hostnames coming out of url parsing are already lowercase.
    pub fn allows(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::AllowList;

    #[test]
    fn exact_match_only() {
        let list = AllowList::new(["dls.musics-fa.com", "dl.musics-fa.com"]);
        assert!(list.allows("dls.musics-fa.com"));
        assert!(list.allows("dl.musics-fa.com"));
        assert!(!list.allows("evil.dls.musics-fa.com"));
        assert!(!list.allows("musics-fa.com"));
        assert!(!list.allows("dls.musics-fa.com.evil.net"));
        assert!(!list.allows(""));
    }

    #[test]
    fn normalizes_entries() {
        let list = AllowList::new([" DLS.Musics-FA.com ", ""]);
        assert_eq!(list.len(), 1);
        assert!(list.allows("dls.musics-fa.com"));
    }
}
