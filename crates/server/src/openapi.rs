use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{IntoParams, Modify, OpenApi, ToSchema};
use uuid::Uuid;

#[derive(ToSchema)]
pub struct HealthResponse { pub status: String }

#[derive(ToSchema)]
pub struct RegisterRequest {
    pub display_name: Option<String>,
    /// Code of the referring user
    pub referral_code: Option<String>,
}

#[derive(ToSchema)]
pub struct CreateInviteRequest { pub recruiter_id: Uuid, pub email: String }

#[derive(ToSchema)]
pub struct AcceptInviteRequest { pub user_id: Uuid }

#[derive(IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based
    pub page: Option<u32>,
    /// 1..=100, default 20
    pub per_page: Option<u32>,
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::users::register,
        crate::routes::users::get_user,
        crate::routes::users::resolve_code,
        crate::routes::users::transactions,
        crate::routes::users::invites,
        crate::routes::network::upline,
        crate::routes::network::downline,
        crate::routes::network::downline_tree,
        crate::routes::network::layers,
        crate::routes::network::counts,
        crate::routes::network::leaderboard,
        crate::routes::invites::create,
        crate::routes::invites::accept,
        crate::routes::invites::reconcile,
        crate::routes::admin::list_recruiters,
        crate::routes::admin::promote,
    ),
    components(
        schemas(
            HealthResponse,
            RegisterRequest,
            CreateInviteRequest,
            AcceptInviteRequest,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health"),
        (name = "users"),
        (name = "network"),
        (name = "invites"),
        (name = "admin")
    )
)]
pub struct ApiDoc;
