// API client module: a small blocking HTTP client that talks to the
// M-Pesa backend. One request at a time, bounded timeouts, and a uniform
// result shape so every feature handles failure the same three ways:
// couldn't reach the server, server said no, or server said yes.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use std::time::Duration;

use crate::json::{extract_field, records};
use crate::session::Session;

/// Connect and read timeouts applied to every request. The only bound on
/// how long a menu action can block.
const TIMEOUT: Duration = Duration::from_secs(8);

/// How many history rows the client asks for and renders.
pub const HISTORY_LIMIT: usize = 10;

/// Outcome of one HTTP exchange. `Unreachable` means no status was ever
/// received (connect failure, timeout, or the body read died), which is a
/// different animal from any real status the server can produce.
#[derive(Debug)]
pub enum ApiResult {
    /// 2xx with the response body.
    Success { status: u16, body: String },
    /// Any non-2xx status with the response body.
    HttpError { status: u16, body: String },
    /// No HTTP exchange completed.
    Unreachable,
}

impl ApiResult {
    /// Status code of the exchange, with 0 reserved for "no exchange
    /// happened"; no real server returns 0.
    pub fn status(&self) -> u16 {
        match self {
            ApiResult::Success { status, .. } | ApiResult::HttpError { status, .. } => *status,
            ApiResult::Unreachable => 0,
        }
    }
}

/// Why a feature operation failed. Exhaustive so the UI can't forget a
/// failure class.
#[derive(Debug, thiserror::Error)]
pub enum OpError {
    /// Rejected before any network call (empty field, bad amount).
    #[error("{0}")]
    Invalid(String),
    /// The server could not be reached at all.
    #[error("Cannot reach the server. Is the backend running?")]
    Unreachable,
    /// An authenticated call came back with a token rejection; the
    /// session has already been cleared.
    #[error("Your session has expired. Please log in again.")]
    SessionExpired,
    /// The server answered with an error, reported verbatim when it
    /// supplied one.
    #[error("{0}")]
    Server(String),
}

#[derive(Serialize, Debug)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize, Debug)]
struct LogoutRequest<'a> {
    refresh: &'a str,
}

#[derive(Serialize, Debug)]
struct SendRequest<'a> {
    recipient_phone: &'a str,
    amount: f64,
    pin: &'a str,
    description: &'a str,
}

#[derive(Serialize, Debug)]
struct DepositRequest<'a> {
    amount: f64,
    reference: &'a str,
}

#[derive(Serialize, Debug)]
struct WithdrawRequest<'a> {
    amount: f64,
    pin: &'a str,
    description: &'a str,
}

/// What a successful login tells the UI.
#[derive(Debug)]
pub struct LoginSummary {
    pub display_name: String,
    pub phone_number: String,
}

/// Balance screen data.
#[derive(Debug)]
pub struct BalanceInfo {
    pub balance: String,
    pub phone_number: String,
    pub account_holder: String,
}

/// Confirmation for send/deposit/withdraw.
#[derive(Debug)]
pub struct Receipt {
    pub transaction_id: String,
    pub new_balance: String,
}

/// One row of transaction history, kept as the server's own text.
#[derive(Debug)]
pub struct TransactionRecord {
    pub transaction_type: String,
    pub amount: String,
    pub balance_after: String,
    pub transaction_id: String,
}

/// History screen data: the account's total recorded count plus the
/// fetched rows.
#[derive(Debug)]
pub struct HistoryPage {
    pub count: String,
    pub transactions: Vec<TransactionRecord>,
}

/// Blocking API client. Owns the login [`Session`]: feature calls read it
/// to attach the bearer token and are the only place it gets mutated.
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    /// Create an ApiClient configured from the environment variable
    /// `MPESA_API_URL` or fallback to the local Django default.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("MPESA_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".into());
        Self::new(base_url)
    }

    fn new(base_url: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(TIMEOUT)
            .timeout(TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            base_url,
            session: Session::default(),
        })
    }

    /// Read access to the current session, for the UI header and the
    /// logged-in check.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// POST `body` as JSON, attaching the bearer token when `attach_auth`
    /// is set and the session actually holds one.
    fn post<T: Serialize>(&self, path: &str, body: &T, attach_auth: bool) -> ApiResult {
        let url = format!("{}{}", self.base_url, path);
        // Serialization of these flat request structs cannot realistically
        // fail; if it somehow does, fold it in with transport failure like
        // every other pre-status breakage.
        let payload = match serde_json::to_string(body) {
            Ok(payload) => payload,
            Err(_) => return ApiResult::Unreachable,
        };
        let mut req = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        if attach_auth && !self.session.access_token.is_empty() {
            req = req.bearer_auth(&self.session.access_token);
        }
        Self::dispatch(req)
    }

    /// GET `path`. Always attaches the bearer token when one is held;
    /// every GET this client makes is an authenticated one.
    fn get(&self, path: &str) -> ApiResult {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .client
            .get(&url)
            .header(CONTENT_TYPE, "application/json");
        if !self.session.access_token.is_empty() {
            req = req.bearer_auth(&self.session.access_token);
        }
        Self::dispatch(req)
    }

    /// Run one request/response cycle. All transport trouble (refused
    /// connection, timeout, a body read that dies mid-stream) folds into
    /// `Unreachable`; this never retries and never panics.
    fn dispatch(req: reqwest::blocking::RequestBuilder) -> ApiResult {
        match req.send() {
            Ok(resp) => {
                let status = resp.status();
                match resp.text() {
                    Ok(body) if status.is_success() => ApiResult::Success {
                        status: status.as_u16(),
                        body,
                    },
                    Ok(body) => ApiResult::HttpError {
                        status: status.as_u16(),
                        body,
                    },
                    Err(_) => ApiResult::Unreachable,
                }
            }
            Err(_) => ApiResult::Unreachable,
        }
    }

    /// Turn a non-2xx response into an [`OpError`]. A 401 on an
    /// authenticated call with no `error` field is a token rejection
    /// (the backend's auth layer reports those under `detail`), so the
    /// session is dropped; a 401 that does carry `error` is a business
    /// refusal (wrong PIN) and the session survives. Otherwise the
    /// server's `error` text is passed through verbatim, with a fixed
    /// per-operation fallback when the body has none.
    fn fail(&mut self, status: u16, body: &str, fallback: &str) -> OpError {
        let err = extract_field(body, "error");
        if status == 401 && self.session.is_authenticated() && err.is_empty() {
            self.session.clear();
            return OpError::SessionExpired;
        }
        if err.is_empty() {
            OpError::Server(fallback.to_string())
        } else {
            OpError::Server(err)
        }
    }

    /// Log in. On 200 the session becomes authenticated only if the body
    /// actually carries an access token; a 200 without one is reported as
    /// a server error and the session stays anonymous.
    pub fn login(&mut self, username: &str, password: &str) -> Result<LoginSummary, OpError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(OpError::Invalid(
                "Username and password cannot be empty.".into(),
            ));
        }
        let req = LoginRequest { username, password };
        match self.post("/api/auth/login/", &req, false) {
            ApiResult::Success { body, .. } => {
                let access = extract_field(&body, "access");
                let refresh = extract_field(&body, "refresh");
                let full_name = extract_field(&body, "full_name");
                let phone_number = extract_field(&body, "phone_number");
                if !self
                    .session
                    .begin(username, access, refresh, full_name, phone_number)
                {
                    return Err(OpError::Server(
                        "Login response carried no access token.".into(),
                    ));
                }
                Ok(LoginSummary {
                    display_name: self.session.display_name().to_string(),
                    phone_number: self.session.phone_number.clone(),
                })
            }
            ApiResult::HttpError { status, body } => {
                Err(self.fail(status, &body, &format!("Login failed (HTTP {status})")))
            }
            ApiResult::Unreachable => Err(OpError::Unreachable),
        }
    }

    /// Log out. Tells the server to blacklist the refresh token, then
    /// clears the session no matter what the call did; a dead server
    /// must not trap the user in a logged-in client.
    pub fn logout(&mut self) {
        let req = LogoutRequest {
            refresh: &self.session.refresh_token,
        };
        let _ = self.post("/api/auth/logout/", &req, true);
        self.session.clear();
    }

    pub fn balance(&mut self) -> Result<BalanceInfo, OpError> {
        match self.get("/api/balance/") {
            ApiResult::Success { body, .. } => Ok(BalanceInfo {
                balance: extract_field(&body, "balance"),
                phone_number: extract_field(&body, "phone_number"),
                account_holder: extract_field(&body, "account_holder"),
            }),
            ApiResult::HttpError { status, body } => {
                Err(self.fail(status, &body, "Failed to fetch balance."))
            }
            ApiResult::Unreachable => Err(OpError::Unreachable),
        }
    }

    pub fn send_money(
        &mut self,
        recipient_phone: &str,
        amount: f64,
        pin: &str,
        description: &str,
    ) -> Result<Receipt, OpError> {
        let recipient_phone = recipient_phone.trim();
        if recipient_phone.is_empty() {
            return Err(OpError::Invalid("Recipient phone is required.".into()));
        }
        if amount <= 0.0 {
            return Err(OpError::Invalid("Invalid amount entered.".into()));
        }
        if pin.is_empty() {
            return Err(OpError::Invalid("PIN is required.".into()));
        }
        let req = SendRequest {
            recipient_phone,
            amount,
            pin,
            description,
        };
        self.transaction("/api/send/", &req, "Transaction failed.")
    }

    pub fn deposit(&mut self, amount: f64, reference: &str) -> Result<Receipt, OpError> {
        if amount <= 0.0 {
            return Err(OpError::Invalid("Invalid amount.".into()));
        }
        let req = DepositRequest { amount, reference };
        self.transaction("/api/deposit/", &req, "Deposit failed.")
    }

    pub fn withdraw(&mut self, amount: f64, pin: &str) -> Result<Receipt, OpError> {
        if amount <= 0.0 {
            return Err(OpError::Invalid("Invalid amount.".into()));
        }
        if pin.is_empty() {
            return Err(OpError::Invalid("PIN is required.".into()));
        }
        let req = WithdrawRequest {
            amount,
            pin,
            description: "Cash withdrawal",
        };
        self.transaction("/api/withdraw/", &req, "Withdrawal failed.")
    }

    /// Shared tail of the three money movements: post, then read the
    /// receipt fields out of the confirmation body.
    fn transaction<T: Serialize>(
        &mut self,
        path: &str,
        req: &T,
        fallback: &str,
    ) -> Result<Receipt, OpError> {
        match self.post(path, req, true) {
            ApiResult::Success { body, .. } => Ok(Receipt {
                transaction_id: extract_field(&body, "transaction_id"),
                new_balance: extract_field(&body, "new_balance"),
            }),
            ApiResult::HttpError { status, body } => Err(self.fail(status, &body, fallback)),
            ApiResult::Unreachable => Err(OpError::Unreachable),
        }
    }

    /// Fetch the last [`HISTORY_LIMIT`] transactions. The body holds a
    /// flat array of records; each is located by its `transaction_type`
    /// anchor and its fields read from that record's own slice.
    pub fn history(&mut self) -> Result<HistoryPage, OpError> {
        match self.get(&format!("/api/transactions/?limit={HISTORY_LIMIT}")) {
            ApiResult::Success { body, .. } => {
                let count = extract_field(&body, "count");
                let transactions = records(&body, "transaction_type", HISTORY_LIMIT)
                    .map(|slice| TransactionRecord {
                        transaction_type: extract_field(slice, "transaction_type"),
                        amount: extract_field(slice, "amount"),
                        balance_after: extract_field(slice, "balance_after"),
                        transaction_id: extract_field(slice, "transaction_id"),
                    })
                    .collect();
                Ok(HistoryPage {
                    count,
                    transactions,
                })
            }
            ApiResult::HttpError { status, body } => {
                Err(self.fail(status, &body, "Failed to fetch transactions."))
            }
            ApiResult::Unreachable => Err(OpError::Unreachable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve exactly one canned HTTP response on a fresh local port and
    /// return the base URL to reach it.
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let resp = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(resp.as_bytes());
        });
        format!("http://{addr}")
    }

    /// A local URL nothing is listening on: bind a port, then free it.
    fn dead_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    fn client(base_url: String) -> ApiClient {
        ApiClient::new(base_url).unwrap()
    }

    fn authenticated_client(base_url: String) -> ApiClient {
        let mut api = client(base_url);
        api.session.begin(
            "jane",
            "tok1".into(),
            "ref1".into(),
            "Jane Doe".into(),
            "0711000111".into(),
        );
        api
    }

    #[test]
    fn unreachable_server_is_the_zero_status() {
        let api = client(dead_url());
        let result = api.get("/api/balance/");
        assert!(matches!(result, ApiResult::Unreachable));
        assert_eq!(result.status(), 0);
    }

    #[test]
    fn reachable_server_reports_real_status_and_body() {
        let api = client(serve_once("418 I'm a teapot", r#"{"error":"no"}"#));
        match api.get("/api/balance/") {
            ApiResult::HttpError { status, body } => {
                assert_eq!(status, 418);
                assert_eq!(body, r#"{"error":"no"}"#);
            }
            other => panic!("expected HttpError, got {other:?}"),
        }
    }

    #[test]
    fn login_success_populates_session() {
        let base = serve_once(
            "200 OK",
            r#"{"access":"tok1","refresh":"ref1","full_name":"Jane Doe","phone_number":"0711000111"}"#,
        );
        let mut api = client(base);
        let summary = api.login("jane", "secret").unwrap();
        assert_eq!(summary.display_name, "Jane Doe");
        assert_eq!(summary.phone_number, "0711000111");
        assert!(api.session.is_authenticated());
        assert_eq!(api.session.access_token, "tok1");
        assert_eq!(api.session.refresh_token, "ref1");
        assert_eq!(api.session.username, "jane");
    }

    #[test]
    fn login_200_without_token_stays_anonymous() {
        let base = serve_once("200 OK", r#"{"message":"Login successful"}"#);
        let mut api = client(base);
        let err = api.login("jane", "secret").unwrap_err();
        assert!(matches!(err, OpError::Server(_)));
        assert!(!api.session.is_authenticated());
    }

    #[test]
    fn login_passes_server_error_through() {
        let base = serve_once("401 Unauthorized", r#"{"error":"Invalid username or password"}"#);
        let mut api = client(base);
        match api.login("jane", "wrong") {
            Err(OpError::Server(msg)) => assert_eq!(msg, "Invalid username or password"),
            other => panic!("expected Server error, got {other:?}"),
        }
        assert!(!api.session.is_authenticated());
    }

    #[test]
    fn login_rejects_empty_credentials_locally() {
        let mut api = client(dead_url());
        let err = api.login("", "secret").unwrap_err();
        assert!(matches!(err, OpError::Invalid(_)));
    }

    #[test]
    fn logout_clears_session_even_when_server_is_down() {
        let mut api = authenticated_client(dead_url());
        api.logout();
        assert!(!api.session.is_authenticated());
        assert_eq!(*api.session(), Session::default());
    }

    #[test]
    fn balance_extracts_the_three_display_fields() {
        let base = serve_once(
            "200 OK",
            r#"{"phone_number":"0711000111","balance":"2500.00","currency":"KES","account_holder":"Jane Doe"}"#,
        );
        let mut api = authenticated_client(base);
        let info = api.balance().unwrap();
        assert_eq!(info.balance, "2500.00");
        assert_eq!(info.phone_number, "0711000111");
        assert_eq!(info.account_holder, "Jane Doe");
    }

    #[test]
    fn send_with_zero_amount_never_touches_the_network() {
        // A dead endpoint would surface as Unreachable; Invalid proves the
        // call was refused before any request went out.
        let mut api = authenticated_client(dead_url());
        let err = api.send_money("0722345678", 0.0, "1234", "").unwrap_err();
        assert!(matches!(err, OpError::Invalid(_)));
    }

    #[test]
    fn send_success_returns_receipt() {
        let base = serve_once(
            "200 OK",
            r#"{"message":"Money sent successfully","transaction_id":"TXNABC123","amount":"100.00","new_balance":"2400.00"}"#,
        );
        let mut api = authenticated_client(base);
        let receipt = api.send_money("0722345678", 100.0, "1234", "lunch").unwrap();
        assert_eq!(receipt.transaction_id, "TXNABC123");
        assert_eq!(receipt.new_balance, "2400.00");
    }

    #[test]
    fn wrong_pin_is_a_server_refusal_not_session_expiry() {
        let base = serve_once("401 Unauthorized", r#"{"error":"Invalid PIN"}"#);
        let mut api = authenticated_client(base);
        match api.withdraw(50.0, "0000") {
            Err(OpError::Server(msg)) => assert_eq!(msg, "Invalid PIN"),
            other => panic!("expected Server error, got {other:?}"),
        }
        assert!(api.session.is_authenticated());
    }

    #[test]
    fn token_rejection_drops_the_session() {
        let base = serve_once(
            "401 Unauthorized",
            r#"{"detail":"Given token not valid for any token type","code":"token_not_valid"}"#,
        );
        let mut api = authenticated_client(base);
        let err = api.balance().unwrap_err();
        assert!(matches!(err, OpError::SessionExpired));
        assert!(!api.session.is_authenticated());
    }

    #[test]
    fn history_yields_count_and_per_record_fields() {
        let base = serve_once(
            "200 OK",
            r#"{"count": 2, "transactions": [{"id":1,"transaction_type":"SEND","amount":"100.00","recipient_phone":"0722345678","reference":"","description":"","status":"SUCCESS","transaction_id":"TXN1","balance_before":"2500.00","balance_after":"2400.00","created_at":"2024-01-01T10:00:00Z"},{"id":2,"transaction_type":"DEPOSIT","amount":"500.00","recipient_phone":"","reference":"AGENT7","description":"","status":"SUCCESS","transaction_id":"TXN2","balance_before":"2400.00","balance_after":"2900.00","created_at":"2024-01-02T10:00:00Z"}]}"#,
        );
        let mut api = authenticated_client(base);
        let page = api.history().unwrap();
        assert_eq!(page.count, "2");
        assert_eq!(page.transactions.len(), 2);
        assert_eq!(page.transactions[0].transaction_type, "SEND");
        assert_eq!(page.transactions[0].balance_after, "2400.00");
        assert_eq!(page.transactions[1].transaction_id, "TXN2");
        assert_eq!(page.transactions[1].amount, "500.00");
    }

    #[test]
    fn history_with_no_records_is_empty_not_an_error() {
        let base = serve_once("200 OK", r#"{"count": 0, "transactions": []}"#);
        let mut api = authenticated_client(base);
        let page = api.history().unwrap();
        assert_eq!(page.count, "0");
        assert!(page.transactions.is_empty());
    }
}
