// Session state for one interactive run. A single identity shared by every
// feature call; never written to disk, gone when the process exits.

/// The current login session. `authenticated` is private so the invariant
/// "authenticated exactly when an access token is held" can only be
/// established through [`Session::begin`] and torn down through
/// [`Session::clear`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub username: String,
    pub full_name: String,
    pub phone_number: String,
    authenticated: bool,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Populate the session from a successful login. Refuses an empty
    /// access token: a 200 whose body carries no token must leave the
    /// session anonymous rather than half-authenticated. Returns whether
    /// the transition happened.
    pub fn begin(
        &mut self,
        username: &str,
        access_token: String,
        refresh_token: String,
        full_name: String,
        phone_number: String,
    ) -> bool {
        if access_token.is_empty() {
            return false;
        }
        self.access_token = access_token;
        self.refresh_token = refresh_token;
        self.username = username.to_string();
        self.full_name = full_name;
        self.phone_number = phone_number;
        self.authenticated = true;
        true
    }

    /// Drop back to anonymous: every field reset, unconditionally.
    pub fn clear(&mut self) {
        *self = Session::default();
    }

    /// Name to greet the user with: full name when the backend supplied
    /// one, otherwise the username they typed.
    pub fn display_name(&self) -> &str {
        if self.full_name.is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }
}
