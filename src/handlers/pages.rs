use crate::auth::RequestContext;
use crate::error::AppError;
use crate::middleware::csrf::get_or_create_csrf_token;
use crate::models::user::SessionUser;
use askama::Template;
use askama_web::WebTemplate;

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub(crate) user: Option<SessionUser>,
    pub(crate) message: Option<String>,
    pub(crate) csrf_token: String,
}

/// Landing page: the signed-in user, if any, and at most one pending message.
pub async fn index_handler(ctx: RequestContext) -> Result<IndexTemplate, AppError> {
    Ok(IndexTemplate {
        user: ctx.user().cloned(),
        message: ctx.take_flash().await?,
        csrf_token: get_or_create_csrf_token(ctx.session()).await?,
    })
}
