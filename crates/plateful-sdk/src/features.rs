//! Likes, saves and follows.
//!
//! Each feature is one REST endpoint on the backend. Requests carry the
//! entity id and the absolute `desired_state`; each endpoint answers with its
//! own field names, which are decoded into a [`ToggleOutcome`].
//!
//! ```text
//! POST /visits/{visit_id}/like   {"visit_id", "desired_state"} -> {"liked", "like_count"}
//! POST /visits/{visit_id}/save   {"visit_id", "desired_state"} -> {"saved", "save_count"}
//! POST /users/{user_id}/follow   {"user_id",  "desired_state"} -> {"following", "follower_count"}
//! ```

use crate::backend::{ToggleAck, ToggleBackend, ToggleOutcome};
use crate::error::BackendError;
use crate::transport::Transport;
use async_trait::async_trait;
use plateful_core::{EntityId, UserId, VisitId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// The kinds of toggle the app offers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Like,
    Save,
    Follow,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::Like => write!(f, "like"),
            Feature::Save => write!(f, "save"),
            Feature::Follow => write!(f, "follow"),
        }
    }
}

/// Request body for the visit endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitToggleRequest {
    pub visit_id: String,
    pub desired_state: bool,
}

/// Request body for the follow endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowRequest {
    pub user_id: String,
    pub desired_state: bool,
}

/// The part of every request body the server acts on.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct DesiredStateBody {
    pub desired_state: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeAck {
    pub liked: bool,
    pub like_count: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveAck {
    pub saved: bool,
    pub save_count: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowAck {
    pub following: bool,
    pub follower_count: u64,
}

impl ToggleAck for LikeAck {
    fn state(&self) -> bool {
        self.liked
    }

    fn count(&self) -> u64 {
        self.like_count
    }
}

impl ToggleAck for SaveAck {
    fn state(&self) -> bool {
        self.saved
    }

    fn count(&self) -> u64 {
        self.save_count
    }
}

impl ToggleAck for FollowAck {
    fn state(&self) -> bool {
        self.following
    }

    fn count(&self) -> u64 {
        self.follower_count
    }
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::Like, Feature::Save, Feature::Follow];

    fn collection(&self) -> &'static str {
        match self {
            Feature::Like | Feature::Save => "visits",
            Feature::Follow => "users",
        }
    }

    /// Endpoint path for `id`.
    pub fn path(&self, id: &str) -> String {
        format!("/{}/{}/{}", self.collection(), id, self)
    }

    /// Split an endpoint path back into feature and entity id.
    pub fn parse_path(path: &str) -> Option<(Feature, &str)> {
        let mut parts = path.strip_prefix('/')?.split('/');
        let (collection, id, action) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || id.is_empty() {
            return None;
        }

        let feature = Feature::ALL.into_iter().find(|f| f.to_string() == action)?;
        (feature.collection() == collection).then_some((feature, id))
    }

    /// Encode the request body.
    pub fn request_body(&self, id: &str, desired_state: bool) -> Result<Value, BackendError> {
        let body = match self {
            Feature::Like | Feature::Save => serde_json::to_value(VisitToggleRequest {
                visit_id: id.to_string(),
                desired_state,
            })?,
            Feature::Follow => serde_json::to_value(FollowRequest {
                user_id: id.to_string(),
                desired_state,
            })?,
        };
        Ok(body)
    }

    /// Encode a server answer in this feature's response shape.
    pub fn ack_body(&self, state: bool, count: u64) -> Result<Value, BackendError> {
        let body = match self {
            Feature::Like => serde_json::to_value(LikeAck {
                liked: state,
                like_count: count,
            })?,
            Feature::Save => serde_json::to_value(SaveAck {
                saved: state,
                save_count: count,
            })?,
            Feature::Follow => serde_json::to_value(FollowAck {
                following: state,
                follower_count: count,
            })?,
        };
        Ok(body)
    }

    /// Decode a server answer in this feature's response shape.
    pub fn decode_ack(&self, body: Value) -> Result<ToggleOutcome, BackendError> {
        fn outcome<A: ToggleAck>(ack: A) -> ToggleOutcome {
            ToggleOutcome::new(ack.state(), ack.count())
        }

        let decoded = match self {
            Feature::Like => outcome(serde_json::from_value::<LikeAck>(body)?),
            Feature::Save => outcome(serde_json::from_value::<SaveAck>(body)?),
            Feature::Follow => outcome(serde_json::from_value::<FollowAck>(body)?),
        };
        Ok(decoded)
    }
}

/// A [`ToggleBackend`] that speaks one feature's endpoint over a [`Transport`].
pub struct FeatureBackend<K, T: Transport> {
    feature: Feature,
    transport: Arc<T>,
    _id: PhantomData<fn() -> K>,
}

impl<K, T: Transport> FeatureBackend<K, T> {
    fn with_feature(feature: Feature, transport: Arc<T>) -> Self {
        Self {
            feature,
            transport,
            _id: PhantomData,
        }
    }

    pub fn feature(&self) -> Feature {
        self.feature
    }
}

impl<T: Transport> FeatureBackend<VisitId, T> {
    pub fn likes(transport: Arc<T>) -> Self {
        Self::with_feature(Feature::Like, transport)
    }

    pub fn saves(transport: Arc<T>) -> Self {
        Self::with_feature(Feature::Save, transport)
    }
}

impl<T: Transport> FeatureBackend<UserId, T> {
    pub fn follows(transport: Arc<T>) -> Self {
        Self::with_feature(Feature::Follow, transport)
    }
}

#[async_trait]
impl<K: EntityId, T: Transport> ToggleBackend for FeatureBackend<K, T> {
    type Id = K;
    type Ack = ToggleOutcome;

    async fn set_state(&self, id: &K, desired_state: bool) -> Result<ToggleOutcome, BackendError> {
        let id = id.to_string();
        let body = self.feature.request_body(&id, desired_state)?;
        let reply = self.transport.post(&self.feature.path(&id), body).await?;
        self.feature.decode_ack(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_paths() {
        assert_eq!(Feature::Like.path("v1"), "/visits/v1/like");
        assert_eq!(Feature::Save.path("v1"), "/visits/v1/save");
        assert_eq!(Feature::Follow.path("u1"), "/users/u1/follow");
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(
            Feature::parse_path("/visits/v1/like"),
            Some((Feature::Like, "v1"))
        );
        assert_eq!(
            Feature::parse_path("/users/u1/follow"),
            Some((Feature::Follow, "u1"))
        );
        assert_eq!(Feature::parse_path("/users/u1/like"), None);
        assert_eq!(Feature::parse_path("/visits/v1/like/extra"), None);
        assert_eq!(Feature::parse_path("visits/v1/like"), None);
    }

    #[test]
    fn test_request_carries_absolute_state() {
        let body = Feature::Like.request_body("v1", false).unwrap();
        assert_eq!(body, json!({"visit_id": "v1", "desired_state": false}));

        let body = Feature::Follow.request_body("u1", true).unwrap();
        assert_eq!(body, json!({"user_id": "u1", "desired_state": true}));
    }

    #[test]
    fn test_decode_feature_shapes() {
        let like = Feature::Like
            .decode_ack(json!({"liked": true, "like_count": 12}))
            .unwrap();
        assert_eq!(like, ToggleOutcome::new(true, 12));

        let follow = Feature::Follow
            .decode_ack(json!({"following": false, "follower_count": 3}))
            .unwrap();
        assert_eq!(follow, ToggleOutcome::new(false, 3));
    }

    #[test]
    fn test_decode_wrong_shape_fails() {
        let err = Feature::Save
            .decode_ack(json!({"liked": true, "like_count": 1}))
            .unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
    }
}
