use serde::{Deserialize, Serialize};

use crate::schema;

/// A message delivered to one identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notification {
    pub id: String,
    /// Recipient identity
    pub owner_id: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub collaboration_id: Option<String>,
}

entity!(Notification, "Notification", unique = false);

schema!(Notification {
    id: scalar,
    owner_id: scalar,
    title: scalar,
    message: scalar,
    read: scalar,
    collaboration_id: scalar,
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationDto {
    pub id: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub collaboration_id: Option<String>,
}

schema!(NotificationDto {
    id: scalar,
    title: scalar,
    message: scalar,
    read: scalar,
    collaboration_id: scalar,
});
