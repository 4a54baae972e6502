use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use time::OffsetDateTime;

/// Claims as found in the parsed token handed out by the identity provider client.
/// Every field is optional, as we do not control which claims a realm maps into its tokens.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawClaims {
    iss: Option<String>,
    sub: Option<String>,
    aud: Option<RawAudiences>,
    exp: Option<i64>,
    iat: Option<i64>,
    email_verified: Option<bool>,
    name: Option<String>,
    preferred_username: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    email: Option<String>,
    realm_access: Option<RealmAccess>,
    resource_access: Option<ResourceAccess>,
    #[serde(flatten)]
    remaining: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
enum RawAudiences {
    Single(String),
    Multiple(Vec<String>),
}

/// Decoded identity assertions of the current session.
///
/// Derived from the identity provider client's parsed token each time the session is
/// established or refreshed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeycloakClaims {
    /// (iss) Issuer Identifier for the Issuer of the response.
    pub issuer: Option<String>,

    /// (sub) Subject Identifier. A locally unique and never reassigned identifier within the
    /// issuer for the end-user.
    pub subject: Option<String>,

    /// (aud) Audience(s) that this token is intended for.
    pub audiences: Option<Audiences>,

    /// (`exp`) Expiration time on or after which the token MUST NOT be accepted.
    pub expires_at: Option<OffsetDateTime>,

    /// (`iat`) Time at which the token was issued.
    pub issued_at: Option<OffsetDateTime>,

    /// KEYCLOAK SPECIFIC. Whether the user verified his email address.
    pub email_verified: bool,

    /// KEYCLOAK SPECIFIC. Full name of the user. Expect this to roughly be
    /// `format!("{given_name} {family_name}")`.
    pub name: String,

    /// KEYCLOAK SPECIFIC. Preferred username. It may be the users email, name or something else
    /// entirely.
    pub preferred_username: String,

    /// KEYCLOAK SPECIFIC. First name.
    pub given_name: String,

    /// KEYCLOAK SPECIFIC. Last name.
    pub family_name: String,

    /// KEYCLOAK SPECIFIC. Email address of the user.
    pub email: String,

    /// KEYCLOAK SPECIFIC. Realm roles.
    pub realm_access: Option<RealmAccess>,

    /// KEYCLOAK SPECIFIC. Roles per client (resource).
    pub resource_access: Option<ResourceAccess>,

    pub additional_claims: HashMap<String, serde_json::Value>,
}

fn timestamp(claim: &'static str, value: Option<i64>) -> Option<OffsetDateTime> {
    value.and_then(|it| match OffsetDateTime::from_unix_timestamp(it) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::warn!(?err, claim, "Token contained a non-parsable timestamp. Ignoring it.");
            None
        }
    })
}

impl From<RawClaims> for KeycloakClaims {
    fn from(raw: RawClaims) -> Self {
        Self {
            issuer: raw.iss,
            subject: raw.sub,
            audiences: raw.aud.map(|aud| match aud {
                RawAudiences::Single(s) => Audiences::Single(s),
                RawAudiences::Multiple(m) => Audiences::Multiple(m),
            }),
            expires_at: timestamp("exp", raw.exp),
            issued_at: timestamp("iat", raw.iat),
            email_verified: raw.email_verified.unwrap_or_default(),
            name: raw.name.unwrap_or_default(),
            preferred_username: raw.preferred_username.unwrap_or_default(),
            given_name: raw.given_name.unwrap_or_default(),
            family_name: raw.family_name.unwrap_or_default(),
            email: raw.email.unwrap_or_default(),
            realm_access: raw.realm_access,
            resource_access: raw.resource_access,
            additional_claims: raw.remaining,
        }
    }
}

impl KeycloakClaims {
    /// Decode claims from the parsed token of an identity provider client.
    ///
    /// Never fails. Claims which cannot be decoded are logged and left at their defaults.
    pub fn from_value(value: serde_json::Value) -> Self {
        match serde_json::from_value::<RawClaims>(value) {
            Ok(raw) => raw.into(),
            Err(err) => {
                tracing::warn!(?err, "Parsed token had an unexpected shape. Using empty claims.");
                Self::default()
            }
        }
    }

    /// All realm roles of the user. Empty if the realm does not map roles into the token.
    pub fn realm_roles(&self) -> BTreeSet<String> {
        self.realm_access
            .as_ref()
            .map(|it| it.0.roles.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_realm_role(&self, role: &str) -> bool {
        self.realm_access
            .as_ref()
            .is_some_and(|it| it.0.roles.iter().any(|r| r == role))
    }

    pub fn has_resource_role(&self, resource: &str, role: &str) -> bool {
        self.resource_access
            .as_ref()
            .and_then(|it| it.0.get(resource))
            .is_some_and(|access| access.roles.iter().any(|r| r == role))
    }

    /// `given_name` and `family_name` joined by a space, falling back to `name`.
    pub fn full_name(&self) -> String {
        let joined = [self.given_name.as_str(), self.family_name.as_str()]
            .into_iter()
            .filter(|it| !it.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if joined.is_empty() {
            self.name.clone()
        } else {
            joined
        }
    }
}

/// Represents the audience(s) (`aud` claim) of a token.
///
/// The `OpenID Connect` specification allows the `audience` to be either a single string
/// or an array of strings. This enum handles both cases.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum Audiences {
    /// A single audience value (common case).
    Single(String),

    /// Multiple audience values.
    Multiple(Vec<String>),
}

/// Contains a list of role names assigned to a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Access {
    /// A list of role names assigned to the user.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Realm-level role assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RealmAccess(pub Access);

/// Resource-specific role assignments, keyed by client/resource id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceAccess(pub HashMap<String, Access>);
