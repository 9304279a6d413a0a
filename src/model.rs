use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Bucket for descriptors whose category label is blank or missing.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// One feed to aggregate and the category it is displayed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDescriptor {
    pub url: String,
    pub category: String,
}

impl FeedDescriptor {
    pub fn new(url: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category: category.into(),
        }
    }

    /// Name of the bucket this descriptor contributes to. Labels are used
    /// verbatim; only a blank one falls back to [`UNCATEGORIZED`].
    pub fn bucket(&self) -> &str {
        if self.category.trim().is_empty() {
            UNCATEGORIZED
        } else {
            &self.category
        }
    }
}

/// A normalized feed entry. Every field is raw text from the feed;
/// `description` may contain HTML and `published_at` is not parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published_at: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub name: String,
    pub articles: Vec<Article>,
}

/// Category name to articles, kept in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMapping {
    categories: Vec<Category>,
}

impl CategoryMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// One empty bucket per distinct descriptor category.
    pub fn from_descriptors(descriptors: &[FeedDescriptor]) -> Self {
        let mut mapping = Self::new();
        for descriptor in descriptors {
            mapping.bucket_mut(descriptor.bucket());
        }
        mapping
    }

    /// Returns the bucket for `name`, appending an empty one if it is new.
    pub fn bucket_mut(&mut self, name: &str) -> &mut Vec<Article> {
        let index = match self.categories.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.categories.push(Category {
                    name: name.to_string(),
                    articles: Vec::new(),
                });
                self.categories.len() - 1
            }
        };
        &mut self.categories[index].articles
    }

    pub fn extend<I>(&mut self, name: &str, articles: I)
    where
        I: IntoIterator<Item = Article>,
    {
        self.bucket_mut(name).extend(articles);
    }

    pub fn get(&self, name: &str) -> Option<&[Article]> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.articles.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn article_count(&self) -> usize {
        self.categories.iter().map(|c| c.articles.len()).sum()
    }
}

impl Serialize for CategoryMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for category in &self.categories {
            map.serialize_entry(&category.name, &category.articles)?;
        }
        map.end()
    }
}
