use rocket::launch;

#[launch]
fn rocket() -> _ {
    board_api::rocket()
}
