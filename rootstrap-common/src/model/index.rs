// rootstrap-common/src/model/index.rs

/// File names a mirror currently serves for one repository, newest-looking first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryIndex {
    entries: Vec<String>,
}

impl RepositoryIndex {
    /// Builds an index from file names in listing order and sorts them in
    /// descending lexical order. This is not a version comparison: `foo-1.2`
    /// sorts ahead of `foo-1.10`.
    pub fn from_file_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries: Vec<String> = names.into_iter().map(Into::into).collect();
        entries.sort_by(|a, b| b.cmp(a));
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_descending_and_keeps_duplicates() {
        let index = RepositoryIndex::from_file_names([
            "acl-2.3-1-x86_64.pkg.tar.zst",
            "zlib-1.3-1-x86_64.pkg.tar.zst",
            "acl-2.3-1-x86_64.pkg.tar.zst",
            "acl-2.4-1-x86_64.pkg.tar.zst",
        ]);
        let names: Vec<&str> = index.iter().collect();
        assert_eq!(
            names,
            vec![
                "zlib-1.3-1-x86_64.pkg.tar.zst",
                "acl-2.4-1-x86_64.pkg.tar.zst",
                "acl-2.3-1-x86_64.pkg.tar.zst",
                "acl-2.3-1-x86_64.pkg.tar.zst",
            ]
        );
        assert_eq!(index.len(), 4);
    }
}
