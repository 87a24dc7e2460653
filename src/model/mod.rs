pub mod character;
pub mod directive;
pub mod event_result;
pub mod foe;
pub mod game_save;
pub mod game_state;
pub mod journal;
pub mod message;
