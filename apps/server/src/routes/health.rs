use actix_web::{HttpResponse, Responder, get};

macros_utils::routes! {
    route liveness,
}

/// Liveness probe for load balancers.
/// Always 200 with an empty body; it says nothing about the monitored resources.
#[get("/")]
pub async fn liveness() -> impl Responder {
    HttpResponse::Ok().finish()
}

#[cfg(test)]
mod tests {
    use actix_web::{App, test};

    use super::*;

    #[actix_web::test]
    async fn test_liveness_is_empty_ok() {
        let app = test::init_service(App::new().configure(routes)).await;
        let response = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;

        assert!(response.status().is_success());
        assert!(test::read_body(response).await.is_empty());
    }
}
