use crate::domain::model::Package;
use crate::utils::error::Result;
use regex::Regex;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRef {
    Name(String),
    /// 負數由尾端往前數，-1 為最後一個資源
    Index(i64),
}

/// 選擇要處理哪些資源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSelector {
    All,
    /// 完整比對資源名稱的正規表達式
    Pattern(String),
    Items(Vec<ResourceRef>),
}

impl Default for ResourceSelector {
    fn default() -> Self {
        Self::last()
    }
}

impl ResourceSelector {
    pub fn last() -> Self {
        Self::Items(vec![ResourceRef::Index(-1)])
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::Items(vec![ResourceRef::Name(name.into())])
    }

    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Items(names.into_iter().map(|n| ResourceRef::Name(n.into())).collect())
    }

    pub fn index(index: i64) -> Self {
        Self::Items(vec![ResourceRef::Index(index)])
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::Pattern(pattern.into())
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    All,
    Pattern(Regex),
    Names(HashSet<String>),
}

#[derive(Debug, Clone)]
pub struct ResourceMatcher {
    matcher: Matcher,
}

impl ResourceMatcher {
    /// 索引在建立時依照 package 的資源清單解析成名稱
    pub fn new(selector: &ResourceSelector, package: &Package) -> Result<Self> {
        let matcher = match selector {
            ResourceSelector::All => Matcher::All,
            ResourceSelector::Pattern(pattern) => {
                Matcher::Pattern(Regex::new(&format!("^(?:{})$", pattern))?)
            }
            ResourceSelector::Items(items) => {
                let count = package.resources.len() as i64;
                let names = items
                    .iter()
                    .filter_map(|item| match item {
                        ResourceRef::Name(name) => Some(name.clone()),
                        ResourceRef::Index(index) => {
                            let position = if *index < 0 { count + index } else { *index };
                            if (0..count).contains(&position) {
                                Some(package.resources[position as usize].name.clone())
                            } else {
                                tracing::warn!(
                                    "⚠️ Resource index {} is out of range ({} resources)",
                                    index,
                                    count
                                );
                                None
                            }
                        }
                    })
                    .collect();
                Matcher::Names(names)
            }
        };

        Ok(Self { matcher })
    }

    pub fn matches(&self, resource_name: &str) -> bool {
        match &self.matcher {
            Matcher::All => true,
            Matcher::Pattern(re) => re.is_match(resource_name),
            Matcher::Names(names) => names.contains(resource_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ResourceDescriptor, Schema};

    fn package(names: &[&str]) -> Package {
        Package {
            name: None,
            resources: names
                .iter()
                .map(|n| ResourceDescriptor::new(*n, Schema::default()))
                .collect(),
        }
    }

    #[test]
    fn test_default_selects_last_resource() {
        let dp = package(&["first", "second", "third"]);
        let matcher = ResourceMatcher::new(&ResourceSelector::default(), &dp).unwrap();
        assert!(matcher.matches("third"));
        assert!(!matcher.matches("first"));
        assert!(!matcher.matches("second"));
    }

    #[test]
    fn test_pattern_is_anchored() {
        let dp = package(&["sales", "sales_2024", "presales"]);
        let matcher = ResourceMatcher::new(&ResourceSelector::pattern("sales"), &dp).unwrap();
        assert!(matcher.matches("sales"));
        assert!(!matcher.matches("sales_2024"));
        assert!(!matcher.matches("presales"));

        let wide = ResourceMatcher::new(&ResourceSelector::pattern("sales.*"), &dp).unwrap();
        assert!(wide.matches("sales_2024"));
    }

    #[test]
    fn test_mixed_names_and_indices() {
        let dp = package(&["a", "b", "c"]);
        let selector = ResourceSelector::Items(vec![
            ResourceRef::Index(0),
            ResourceRef::Name("c".to_string()),
            ResourceRef::Index(7),
        ]);
        let matcher = ResourceMatcher::new(&selector, &dp).unwrap();
        assert!(matcher.matches("a"));
        assert!(!matcher.matches("b"));
        assert!(matcher.matches("c"));
    }

    #[test]
    fn test_all_and_empty_package() {
        let matcher = ResourceMatcher::new(&ResourceSelector::All, &package(&[])).unwrap();
        assert!(matcher.matches("anything"));

        let last = ResourceMatcher::new(&ResourceSelector::last(), &package(&[])).unwrap();
        assert!(!last.matches("anything"));
    }
}
