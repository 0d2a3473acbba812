use serde_json::{Map, Value};

use super::error::CategoryError;

/// Topic categories a current-affairs record can be flagged with.
///
/// The wire names are the historical column names, so some keep their
/// original spelling (`Science_Techonlogy`) and casing (`static_gk`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    National,
    International,
    State,
    ScienceTechnology,
    BusinessEconomyBanking,
    Environment,
    Defence,
    Sports,
    ArtCulture,
    AwardsHonours,
    PersonsInNews,
    GovernmentSchemes,
    Appointment,
    Obituary,
    ImportantDay,
    Rank,
    Mythology,
    Agreement,
    Medical,
    StaticGk,
}

impl Category {
    pub const ALL: [Category; 20] = [
        Category::National,
        Category::International,
        Category::State,
        Category::ScienceTechnology,
        Category::BusinessEconomyBanking,
        Category::Environment,
        Category::Defence,
        Category::Sports,
        Category::ArtCulture,
        Category::AwardsHonours,
        Category::PersonsInNews,
        Category::GovernmentSchemes,
        Category::Appointment,
        Category::Obituary,
        Category::ImportantDay,
        Category::Rank,
        Category::Mythology,
        Category::Agreement,
        Category::Medical,
        Category::StaticGk,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Category::National => "National",
            Category::International => "International",
            Category::State => "State",
            Category::ScienceTechnology => "Science_Techonlogy",
            Category::BusinessEconomyBanking => "Business_Economy_Banking",
            Category::Environment => "Environment",
            Category::Defence => "Defence",
            Category::Sports => "Sports",
            Category::ArtCulture => "Art_Culture",
            Category::AwardsHonours => "Awards_Honours",
            Category::PersonsInNews => "Persons_in_News",
            Category::GovernmentSchemes => "Government_Schemes",
            Category::Appointment => "appointment",
            Category::Obituary => "obituary",
            Category::ImportantDay => "important_day",
            Category::Rank => "rank",
            Category::Mythology => "mythology",
            Category::Agreement => "agreement",
            Category::Medical => "medical",
            Category::StaticGk => "static_gk",
        }
    }

    /// Exact, case-sensitive lookup by wire name.
    pub fn from_tag(tag: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.tag() == tag)
    }

    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CategorySet(u32);

impl CategorySet {
    pub fn empty() -> Self {
        CategorySet(0)
    }

    pub fn insert(&mut self, c: Category) {
        self.0 |= c.bit();
    }

    pub fn contains(&self, c: Category) -> bool {
        self.0 & c.bit() != 0
    }

    /// Tags of the set flags, in enumeration order.
    pub fn tags(&self) -> Vec<&'static str> {
        Category::ALL
            .into_iter()
            .filter(|c| self.contains(*c))
            .map(Category::tag)
            .collect()
    }

    /// Every flag of the enumeration as `{ tag: bool }`.
    pub fn to_flags(&self) -> Value {
        let mut m = Map::new();
        for c in Category::ALL {
            m.insert(c.tag().to_string(), Value::Bool(self.contains(c)));
        }
        Value::Object(m)
    }

    /// Inverse of `to_flags`. Keys outside the enumeration are ignored.
    pub fn from_flags(v: &Value) -> Self {
        let mut set = CategorySet::empty();
        if let Some(obj) = v.as_object() {
            for c in Category::ALL {
                if obj.get(c.tag()).and_then(|b| b.as_bool()).unwrap_or(false) {
                    set.insert(c);
                }
            }
        }
        set
    }
}

pub fn map_categories(value: Option<&Value>) -> Result<CategorySet, CategoryError> {
    let mut set = CategorySet::empty();
    let tags: Vec<&Value> = match value {
        None | Some(Value::Null) => return Ok(set),
        Some(v @ Value::String(_)) => vec![v],
        Some(Value::Array(items)) => items.iter().collect(),
        Some(_) => return Err(CategoryError::InvalidValue),
    };

    for t in tags {
        let Some(raw) = t.as_str() else {
            return Err(CategoryError::InvalidValue);
        };
        let tag = raw.trim();
        match Category::from_tag(tag) {
            Some(c) => set.insert(c),
            None => return Err(CategoryError::UnknownTag(tag.to_string())),
        }
    }
    Ok(set)
}
