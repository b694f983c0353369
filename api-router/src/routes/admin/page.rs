use axum::response::Html;

static ADMIN_PAGE: &str = include_str!("../../../templates/admin.html");

pub async fn show_admin_page() -> Html<&'static str> {
    Html(ADMIN_PAGE)
}
