use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(PostId);

/// An authenticated user as reported by the backend. The client never
/// originates one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(rename = "_id", alias = "id")]
    pub id: UserId,
    #[serde(rename = "name", alias = "displayName")]
    pub display_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn author_ref(&self) -> AuthorRef {
        AuthorRef {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Non-owning back-reference from a post to its author, carrying the cached
/// display fields the backend embeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    #[serde(rename = "_id", alias = "id")]
    pub id: UserId,
    #[serde(rename = "name", alias = "displayName")]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
}

/// One publishable post.
///
/// `updated_at == created_at` means the post was never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    #[serde(rename = "_id", alias = "id")]
    pub id: PostId,
    pub title: String,
    #[serde(rename = "content", alias = "body")]
    pub body: String,
    #[serde(rename = "excerpt", alias = "summary", default)]
    pub summary: String,
    #[serde(rename = "author")]
    pub author_ref: AuthorRef,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "published", alias = "isPublished", default)]
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn was_edited(&self) -> bool {
        self.updated_at > self.created_at
    }
}
