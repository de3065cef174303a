use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use editorial_common::ActorId;

use crate::domain::identity::Actor;
use crate::infrastructure::http::api::ApiError;

/// Set by the identity proxy in front of the service.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";
/// Comma separated role names, may be repeated.
pub const ACTOR_ROLES_HEADER: &str = "x-actor-roles";

/// The actor a request runs for, taken from the identity headers.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {ACTOR_ID_HEADER} header")))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized(format!("{ACTOR_ID_HEADER} is not valid text")))?;
        let id = ActorId::try_new(id)
            .map_err(|err| ApiError::Unauthorized(format!("invalid actor id: {err}")))?;

        let roles = parts
            .headers
            .get_all(ACTOR_ROLES_HEADER)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();

        Ok(CurrentActor(Actor::new(id, roles)))
    }
}
