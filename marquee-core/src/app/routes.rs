use crate::http::Router;

/// Who may call an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    /// Logged-in users; anonymous requests are sent to the login page
    User,
    /// Staff only; other users get 403
    Staff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Health,
    MovieList,
    MovieDetail,
    HiddenList,
    HideMovie,
    UnhideMovie,
    ReviewCreate,
    ReviewEditForm,
    ReviewEditSubmit,
    ReviewDelete,
    PetitionList,
    PetitionForm,
    PetitionCreate,
    PetitionVote,
    PetitionUnvote,
    PetitionApprove,
    PetitionReject,
    TopCustomer,
    AdminAddMovie,
    AdminRemoveMovie,
    Signup,
    LoginForm,
    Login,
    Logout,
}

impl Endpoint {
    pub fn access(self) -> Access {
        match self {
            Endpoint::Health
            | Endpoint::MovieList
            | Endpoint::MovieDetail
            | Endpoint::PetitionList
            | Endpoint::Signup
            | Endpoint::LoginForm
            | Endpoint::Login
            | Endpoint::Logout => Access::Public,
            Endpoint::HiddenList
            | Endpoint::HideMovie
            | Endpoint::UnhideMovie
            | Endpoint::ReviewCreate
            | Endpoint::ReviewEditForm
            | Endpoint::ReviewEditSubmit
            | Endpoint::ReviewDelete
            | Endpoint::PetitionForm
            | Endpoint::PetitionCreate
            | Endpoint::PetitionVote
            | Endpoint::PetitionUnvote => Access::User,
            Endpoint::PetitionApprove
            | Endpoint::PetitionReject
            | Endpoint::TopCustomer
            | Endpoint::AdminAddMovie
            | Endpoint::AdminRemoveMovie => Access::Staff,
        }
    }
}

/// Static paths are registered before the `:id` routes they overlap
pub fn router() -> Router<Endpoint> {
    Router::new()
        .get("/health", Endpoint::Health)
        .get("/movies/", Endpoint::MovieList)
        .get("/movies/hidden/", Endpoint::HiddenList)
        .get("/movies/petitions/", Endpoint::PetitionList)
        .get("/movies/petitions/create/", Endpoint::PetitionForm)
        .post("/movies/petitions/create/", Endpoint::PetitionCreate)
        .get("/movies/top_customer/", Endpoint::TopCustomer)
        .post("/movies/admin/movies/", Endpoint::AdminAddMovie)
        .post("/movies/admin/movies/:id/delete/", Endpoint::AdminRemoveMovie)
        .post("/movies/hide/:id/", Endpoint::HideMovie)
        .post("/movies/unhide/:id/", Endpoint::UnhideMovie)
        .post("/movies/petitions/:id/vote/", Endpoint::PetitionVote)
        .post("/movies/petitions/:id/unvote/", Endpoint::PetitionUnvote)
        .post("/movies/petitions/:id/approve/", Endpoint::PetitionApprove)
        .post("/movies/petitions/:id/reject/", Endpoint::PetitionReject)
        .get("/movies/:id/", Endpoint::MovieDetail)
        .post("/movies/:id/review/create/", Endpoint::ReviewCreate)
        .get("/movies/:id/review/:review_id/edit/", Endpoint::ReviewEditForm)
        .post("/movies/:id/review/:review_id/edit/", Endpoint::ReviewEditSubmit)
        .post("/movies/:id/review/:review_id/delete/", Endpoint::ReviewDelete)
        .post("/accounts/signup/", Endpoint::Signup)
        .get("/accounts/login/", Endpoint::LoginForm)
        .post("/accounts/login/", Endpoint::Login)
        .post("/accounts/logout/", Endpoint::Logout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RouteMatch;
    use http::Method;

    fn resolve(method: Method, path: &str) -> Option<Endpoint> {
        match router().resolve(&method, path) {
            RouteMatch::Found(endpoint, _) => Some(endpoint),
            _ => None,
        }
    }

    #[test]
    fn test_overlapping_paths() {
        assert_eq!(resolve(Method::GET, "/movies/hidden/"), Some(Endpoint::HiddenList));
        assert_eq!(resolve(Method::GET, "/movies/petitions/"), Some(Endpoint::PetitionList));
        assert_eq!(resolve(Method::GET, "/movies/7/"), Some(Endpoint::MovieDetail));
        assert_eq!(resolve(Method::POST, "/movies/petitions/create/"), Some(Endpoint::PetitionCreate));
        assert_eq!(resolve(Method::POST, "/movies/petitions/4/vote/"), Some(Endpoint::PetitionVote));
    }

    #[test]
    fn test_access_levels() {
        assert_eq!(Endpoint::MovieList.access(), Access::Public);
        assert_eq!(Endpoint::ReviewDelete.access(), Access::User);
        assert_eq!(Endpoint::TopCustomer.access(), Access::Staff);
    }
}
