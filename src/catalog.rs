//! Menu catalog
//!
//! Read-only source of categories, items, option groups and payment methods.
//! All spoken aliases live here in one table: prompts and the resolver both
//! read them from the catalog, never from per-screen dictionaries.

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::resolver::Candidate;
use crate::{Error, Result};

/// Catalog compiled into the binary, used when no catalog path is configured
const BUILTIN_CATALOG: &str = include_str!("../assets/menu.json");

/// On-disk catalog document
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    categories: Vec<CategoryFile>,
    option_groups: IndexMap<String, GroupFile>,
    payment_methods: Vec<PaymentMethod>,
}

#[derive(Debug, Deserialize)]
struct CategoryFile {
    id: String,
    name: String,
    items: Vec<ItemFile>,
}

#[derive(Debug, Deserialize)]
struct ItemFile {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    price: u32,
    #[serde(default)]
    options: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct GroupFile {
    label: String,
    values: IndexMap<String, ValueFile>,
}

/// An option value is either a bare alias or an alias with a surcharge
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ValueFile {
    Alias(String),
    Detailed {
        alias: String,
        #[serde(default)]
        surcharge: u32,
    },
}

impl ValueFile {
    fn into_parts(self) -> (String, u32) {
        match self {
            Self::Alias(alias) => (alias, 0),
            Self::Detailed { alias, surcharge } => (alias, surcharge),
        }
    }
}

/// One selectable code within an option group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionValue {
    /// Stable code (e.g. "ice")
    pub code: String,
    /// Localized alias, spoken and matched (e.g. "차가운")
    pub alias: String,
    /// Price delta in minor units
    pub surcharge: u32,
}

impl OptionValue {
    /// Matchable form of this value
    #[must_use]
    pub fn candidate(&self) -> Candidate {
        Candidate::new(&self.code, &self.alias)
    }
}

/// An option group as offered by one item, values in declared order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionGroup {
    /// Group key (e.g. "temperature")
    pub key: String,
    /// Localized group label (e.g. "온도")
    pub label: String,
    /// Values this item allows, in declared order
    pub values: Vec<OptionValue>,
}

impl OptionGroup {
    /// Look up a value by code
    #[must_use]
    pub fn value(&self, code: &str) -> Option<&OptionValue> {
        self.values.iter().find(|v| v.code == code)
    }

    /// Candidate set for this group's selection step
    #[must_use]
    pub fn candidates(&self) -> Vec<Candidate> {
        self.values.iter().map(OptionValue::candidate).collect()
    }
}

/// A menu item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    /// Stable key (e.g. "americano")
    pub id: String,
    /// Display name, also its spoken alias
    pub name: String,
    /// Short description
    pub description: String,
    /// Price in minor units
    pub price: u32,
    /// Option groups in traversal order
    pub option_groups: Vec<OptionGroup>,
}

impl MenuItem {
    /// Matchable form of this item
    #[must_use]
    pub fn candidate(&self) -> Candidate {
        Candidate::new(&self.id, &self.name)
    }

    /// Option group at a step index
    #[must_use]
    pub fn group_at(&self, index: usize) -> Option<&OptionGroup> {
        self.option_groups.get(index)
    }

    /// Option group by key
    #[must_use]
    pub fn group(&self, key: &str) -> Option<&OptionGroup> {
        self.option_groups.iter().find(|g| g.key == key)
    }
}

/// A menu category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub items: Vec<MenuItem>,
}

/// A payment method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    /// Stable key (e.g. "card")
    pub id: String,
    /// Display name, also its spoken alias
    pub name: String,
}

impl PaymentMethod {
    /// Matchable form of this method
    #[must_use]
    pub fn candidate(&self) -> Candidate {
        Candidate::new(&self.id, &self.name)
    }
}

/// Validated, read-only menu catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    categories: Vec<Category>,
    payment_methods: Vec<PaymentMethod>,
}

impl Catalog {
    /// Load the catalog embedded in the binary
    ///
    /// # Errors
    ///
    /// Returns error if the embedded document is invalid
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Load a catalog from a JSON file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&content)?;
        tracing::info!(
            path = %path.display(),
            items = catalog.items().count(),
            "loaded catalog"
        );
        Ok(catalog)
    }

    /// Parse and validate a catalog document
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed, an item references an unknown
    /// group or code, item ids repeat, or no payment method is declared
    pub fn from_json(content: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(content)?;
        Self::from_file(file)
    }

    fn from_file(file: CatalogFile) -> Result<Self> {
        if file.payment_methods.is_empty() {
            return Err(Error::Catalog("no payment methods declared".to_string()));
        }
        let mut methods = HashSet::new();
        for method in &file.payment_methods {
            if !methods.insert(method.id.as_str()) {
                return Err(Error::Catalog(format!(
                    "duplicate payment method id: {}",
                    method.id
                )));
            }
        }

        let mut group_labels = IndexMap::new();
        let mut group_values: IndexMap<String, IndexMap<String, (String, u32)>> = IndexMap::new();
        for (key, group) in file.option_groups {
            let values = group
                .values
                .into_iter()
                .map(|(code, value)| (code, value.into_parts()))
                .collect();
            group_labels.insert(key.clone(), group.label);
            group_values.insert(key, values);
        }

        let mut seen = HashSet::new();
        let mut categories = Vec::with_capacity(file.categories.len());
        for category in file.categories {
            let mut items = Vec::with_capacity(category.items.len());
            for item in category.items {
                if !seen.insert(item.id.clone()) {
                    return Err(Error::Catalog(format!("duplicate item id: {}", item.id)));
                }

                let mut option_groups = Vec::with_capacity(item.options.len());
                for (key, codes) in item.options {
                    let table = group_values.get(&key).ok_or_else(|| {
                        Error::Catalog(format!("item {} uses unknown option group {key}", item.id))
                    })?;
                    {
                        let mut offered = HashSet::new();
                        if let Some(code) = codes.iter().find(|code| !offered.insert(code.as_str())) {
                            return Err(Error::Catalog(format!(
                                "item {} lists {key} code {code} twice",
                                item.id
                            )));
                        }
                    }
                    let values = codes
                        .into_iter()
                        .map(|code| -> Result<OptionValue> {
                            let (alias, surcharge) = table.get(&code).cloned().ok_or_else(|| {
                                Error::Catalog(format!(
                                    "item {} uses unknown {key} code {code}",
                                    item.id
                                ))
                            })?;
                            Ok(OptionValue {
                                code,
                                alias,
                                surcharge,
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    if values.is_empty() {
                        return Err(Error::Catalog(format!(
                            "item {} offers no {key} values",
                            item.id
                        )));
                    }

                    option_groups.push(OptionGroup {
                        label: group_labels.get(&key).cloned().unwrap_or_else(|| key.clone()),
                        key,
                        values,
                    });
                }

                items.push(MenuItem {
                    id: item.id,
                    name: item.name,
                    description: item.description,
                    price: item.price,
                    option_groups,
                });
            }
            categories.push(Category {
                id: category.id,
                name: category.name,
                items,
            });
        }

        Ok(Self {
            categories,
            payment_methods: file.payment_methods,
        })
    }

    /// Categories in declared order
    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// All items across categories, in declared order
    pub fn items(&self) -> impl Iterator<Item = &MenuItem> {
        self.categories.iter().flat_map(|c| c.items.iter())
    }

    /// Find an item by id
    #[must_use]
    pub fn item(&self, id: &str) -> Option<&MenuItem> {
        self.items().find(|item| item.id == id)
    }

    /// Payment methods in declared order
    #[must_use]
    pub fn payment_methods(&self) -> &[PaymentMethod] {
        &self.payment_methods
    }

    /// Find a payment method by id
    #[must_use]
    pub fn payment_method(&self, id: &str) -> Option<&PaymentMethod> {
        self.payment_methods.iter().find(|m| m.id == id)
    }

    /// Candidate set for the browsing step
    #[must_use]
    pub fn item_candidates(&self) -> Vec<Candidate> {
        self.items().map(MenuItem::candidate).collect()
    }

    /// Candidate set for the payment step
    #[must_use]
    pub fn payment_candidates(&self) -> Vec<Candidate> {
        self.payment_methods.iter().map(PaymentMethod::candidate).collect()
    }
}
