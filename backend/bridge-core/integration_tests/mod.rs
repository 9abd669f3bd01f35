mod helpers;

mod push {
    mod entity;
    mod ledger;
    mod plan;
}

mod controller {
    mod session;
}

mod ws {
    mod server;
}
