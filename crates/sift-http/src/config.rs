use bson::{Document, doc};
use serde::{Deserialize, Serialize};

/// What a [`CollectionHttp`](crate::CollectionHttp) exposes and how.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    /// Fields matched against the `search` parameter.
    #[serde(default)]
    pub search_fields: Vec<String>,
    /// Relations that `populate` may expand.
    #[serde(default)]
    pub relations: Vec<Relation>,
    /// Removed from every document before it leaves the server.
    #[serde(default)]
    pub hidden_fields: Vec<String>,
    /// Entity fields listed by the `/_params` endpoint.
    #[serde(default)]
    pub field_names: Vec<String>,
}

impl CollectionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// True for a hidden field and for any dotted path beneath one.
    pub fn is_hidden(&self, field: &str) -> bool {
        self.hidden_fields.iter().any(|hidden| {
            field
                .strip_prefix(hidden.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
        })
    }
}

/// A reference from this collection into another one, expanded with
/// `$lookup` when the request names it in `populate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    /// The `populate` name, also the field the joined documents land in.
    pub name: String,
    pub from: String,
    pub local_field: String,
    #[serde(default = "default_foreign_field")]
    pub foreign_field: String,
    /// To-one relations are unwound to a single embedded document.
    #[serde(default)]
    pub single: bool,
}

fn default_foreign_field() -> String {
    "_id".to_string()
}

impl Relation {
    pub fn stages(&self) -> Vec<Document> {
        let mut stages = vec![doc! {
            "$lookup": {
                "from": self.from.as_str(),
                "localField": self.local_field.as_str(),
                "foreignField": self.foreign_field.as_str(),
                "as": self.name.as_str(),
            }
        }];
        if self.single {
            stages.push(doc! {
                "$unwind": {
                    "path": format!("${}", self.name),
                    "preserveNullAndEmptyArrays": true,
                }
            });
        }
        stages
    }

    /// Parse `name=collection:localField[:foreignField][:one|many]`.
    pub fn parse(spec: &str) -> Option<Self> {
        let (name, target) = spec.split_once('=')?;
        let mut parts = target.split(':').map(str::trim);
        let from = parts.next().filter(|s| !s.is_empty())?;
        let local_field = parts.next().filter(|s| !s.is_empty())?;
        let mut foreign_field = default_foreign_field();
        let mut single = false;
        for part in parts {
            match part {
                "one" => single = true,
                "many" => single = false,
                "" => return None,
                field => foreign_field = field.to_string(),
            }
        }
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            from: from.to_string(),
            local_field: local_field.to_string(),
            foreign_field,
            single,
        })
    }
}
