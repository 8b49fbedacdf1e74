use serde::{Deserialize, Serialize};

/// Stock bloatware shipped on the mini-PC images.
pub const STOCK_REMOVALS: [&str; 5] = [
    "com.netflix.mediaclient",
    "com.globo.globotv",
    "tv.pluto.android",
    "com.spotify.tv.android",
    "com.facebook.katana",
];

/// Ordered, duplicate-free set of packages to remove during a run. Owned by
/// the caller and passed into the pipeline; never ambient state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageSelection {
    packages: Vec<String>,
}

impl PackageSelection {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn stock() -> Self {
        let mut selection = Self::default();
        for package in STOCK_REMOVALS {
            selection.add(package);
        }
        selection
    }

    /// Appends a package, preserving insertion order. Returns false for
    /// blank input or a duplicate.
    pub fn add(&mut self, package: impl Into<String>) -> bool {
        let package = package.into().trim().to_string();
        if package.is_empty() || self.contains(&package) {
            return false;
        }
        self.packages.push(package);
        true
    }

    pub fn remove(&mut self, package: &str) -> bool {
        let before = self.packages.len();
        self.packages.retain(|item| item != package);
        self.packages.len() != before
    }

    /// Flips membership; returns true when the package is now selected.
    pub fn toggle(&mut self, package: &str) -> bool {
        if self.remove(package) {
            false
        } else {
            self.add(package)
        }
    }

    pub fn contains(&self, package: &str) -> bool {
        self.packages.iter().any(|item| item == package)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_selection_keeps_insertion_order() {
        let selection = PackageSelection::stock();
        let listed: Vec<&str> = selection.iter().collect();
        assert_eq!(listed, STOCK_REMOVALS);
    }

    #[test]
    fn rejects_duplicates_and_blank_entries() {
        let mut selection = PackageSelection::empty();
        assert!(selection.add("com.example.one"));
        assert!(!selection.add("com.example.one"));
        assert!(!selection.add("   "));
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn toggle_flips_membership() {
        let mut selection = PackageSelection::empty();
        assert!(selection.toggle("com.example.one"));
        assert!(selection.contains("com.example.one"));
        assert!(!selection.toggle("com.example.one"));
        assert!(selection.is_empty());
    }

    #[test]
    fn remove_keeps_remaining_order() {
        let mut selection = PackageSelection::stock();
        assert!(selection.remove("tv.pluto.android"));
        assert!(!selection.remove("tv.pluto.android"));
        let listed: Vec<&str> = selection.iter().collect();
        assert_eq!(
            listed,
            [
                "com.netflix.mediaclient",
                "com.globo.globotv",
                "com.spotify.tv.android",
                "com.facebook.katana"
            ]
        );
    }
}
