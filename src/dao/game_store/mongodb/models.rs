use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::dao::models::{GameEntity, GameSetupEntity, RoundEntity};
use crate::domain::{BiddingPhase, GamePhase, GameStatus};

/// Game document as laid out in the `games` collection.
///
/// Ids are stored as their hyphenated string form.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    created_at: DateTime,
    updated_at: DateTime,
    setup: GameSetupEntity,
    #[serde(default)]
    rounds: Vec<RoundEntity>,
    in_progress_round: Option<RoundEntity>,
    current_phase: GamePhase,
    bidding_phase: Option<BiddingPhase>,
    status: GameStatus,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
            setup: value.setup,
            rounds: value.rounds,
            in_progress_round: value.in_progress_round,
            current_phase: value.current_phase,
            bidding_phase: value.bidding_phase,
            status: value.status,
        }
    }
}

impl TryFrom<MongoGameDocument> for GameEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoGameDocument) -> MongoResult<Self> {
        let id = Uuid::parse_str(&value.id).map_err(|source| MongoDaoError::InvalidId {
            raw: value.id.clone(),
            source,
        })?;
        Ok(Self {
            id,
            name: value.name,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
            setup: value.setup,
            rounds: value.rounds,
            in_progress_round: value.in_progress_round,
            current_phase: value.current_phase,
            bidding_phase: value.bidding_phase,
            status: value.status,
        })
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}
