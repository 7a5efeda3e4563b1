//! Pure game rules: data model, scoring, bidder rotation and bid validation.
//!
//! Nothing in here performs I/O or owns timers; the stateful machines live in
//! [`crate::state`].

pub mod game;
pub mod scoring;
pub mod turn_order;
pub mod validation;

pub use game::{
    BiddingPhase, Game, GamePhase, GameSetup, GameStatus, MAX_DECKS, PlayerScore, Round,
    SetupError, Suit,
};
pub use scoring::{Standing, max_rounds, score, standings};
pub use turn_order::{next_bidder, ordered_seats, seat_enabled};
pub use validation::{BlindValidation, ValidationState, validate};
