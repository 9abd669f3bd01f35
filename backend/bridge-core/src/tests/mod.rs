mod clock;
mod config;
mod dedup;
mod entity_tracker;
mod health;
mod ledger;
mod router;
