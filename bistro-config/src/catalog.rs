//! Menu catalog: the ordered list of dishes tables can order from.
use crate::LoadError;
use serde::Deserialize;
use std::path::Path;

/// One menu entry. Keys in the catalog file are `kebab-case`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Item {
    pub id: u32,
    pub name: String,
    /// Cooking time, in simulated time units.
    #[serde(default)]
    pub preparation_time: u64,
    #[serde(default = "default_complexity")]
    pub complexity: u32,
    #[serde(default)]
    pub cooking_apparatus: Option<String>,
}

fn default_complexity() -> u32 {
    1
}

/// Immutable, ordered menu shared by every table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemCatalog {
    items: Vec<Item>,
}

impl ItemCatalog {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    /// Parse a catalog document held in memory.
    ///
    /// ```
    /// use bistro_config::ItemCatalog;
    ///
    /// let catalog = ItemCatalog::from_json_str(r#"[
    ///     { "id": 1, "name": "pizza", "preparation-time": 20, "complexity": 2, "cooking-apparatus": "oven" },
    ///     { "id": 2, "name": "salad", "preparation-time": 10 }
    /// ]"#).unwrap();
    ///
    /// assert_eq!(catalog.len(), 2);
    /// assert_eq!(catalog.get(2).unwrap().complexity, 1);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        parse_catalog(json.as_bytes(), Path::new("<inline>"))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Item] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    /// Look an item up by its menu id (not its position).
    pub fn get(&self, id: u32) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }
}

impl<'a> IntoIterator for &'a ItemCatalog {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

pub(crate) fn parse_catalog(bytes: &[u8], path: &Path) -> Result<ItemCatalog, LoadError> {
    let items: Vec<Item> =
        serde_json::from_slice(bytes).map_err(|source| LoadError::CatalogParse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(ItemCatalog::new(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_file_order() {
        let catalog = ItemCatalog::from_json_str(
            r#"[{ "id": 3, "name": "c" }, { "id": 1, "name": "a" }, { "id": 2, "name": "b" }]"#,
        )
        .unwrap();
        let ids: Vec<u32> = catalog.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn empty_array_is_an_empty_catalog() {
        let catalog = ItemCatalog::from_json_str("[]").unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn object_instead_of_array_is_rejected() {
        let err = ItemCatalog::from_json_str(r#"{ "id": 1, "name": "pizza" }"#).unwrap_err();
        assert!(matches!(err, LoadError::CatalogParse { .. }));
    }

    #[test]
    fn item_without_name_is_rejected() {
        let err = ItemCatalog::from_json_str(r#"[{ "id": 1 }]"#).unwrap_err();
        assert!(matches!(err, LoadError::CatalogParse { .. }));
    }

    #[test]
    fn null_apparatus_is_none() {
        let catalog =
            ItemCatalog::from_json_str(r#"[{ "id": 1, "name": "soup", "cooking-apparatus": null }]"#)
                .unwrap();
        assert_eq!(catalog.get(1).unwrap().cooking_apparatus, None);
    }
}
