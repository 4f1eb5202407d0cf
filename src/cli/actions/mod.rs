pub mod server;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        frontend_url: String,
        token_max_age: Option<i64>,
        password_min_length: usize,
    },
}
