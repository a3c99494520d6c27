pub mod friend_list;
pub mod game;
pub mod game_addition;
pub mod share_profile;
