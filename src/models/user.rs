use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fcm_token: Option<String>,
}

/// Body of `POST /api/users`, sent after the identity provider signs a user in.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
}
