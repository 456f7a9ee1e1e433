pub mod align;
pub mod forecast;
pub mod moon;
pub mod normalize;
pub mod open_meteo;
pub mod score;
pub mod seven_timer;
