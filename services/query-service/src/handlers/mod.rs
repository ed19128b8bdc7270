mod activities;
mod audit;
mod events;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    activities::configure(cfg);
    audit::configure(cfg);
    events::configure(cfg);
}
