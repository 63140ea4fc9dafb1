use actix_web::{Scope, web};

pub fn routes() -> Scope {
    web::scope("/dlock")
        .service(super::dlock::lock_test)
        .service(super::dlock::timed_lock_test)
}
