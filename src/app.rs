//! app.rs
use crate::handlers::{
    auth_handler, billing_handler, chat_handler, crm_handler, health_handler, instance_handler,
    media_handler, message_handler, meta_handler, payment_handler, realtime_handler, send_handler,
    stage_handler, user_handler,
};
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(health_handler::root_endpoint));
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health_handler::health_endpoint))
            .service(
                web::scope("/auth")
                    .route("/login", web::post().to(auth_handler::login_endpoint))
                    .route("/me", web::get().to(auth_handler::me_endpoint)),
            )
            .service(
                web::scope("/users")
                    .route("/register", web::post().to(user_handler::register_endpoint))
                    .route("/login", web::post().to(user_handler::user_login_endpoint))
                    .route(
                        "/instances",
                        web::post().to(user_handler::attach_instance_endpoint),
                    )
                    .route(
                        "/instances",
                        web::get().to(user_handler::list_instances_endpoint),
                    )
                    .route(
                        "/instances",
                        web::delete().to(user_handler::detach_instance_endpoint),
                    ),
            )
            .route("/chats", web::post().to(chat_handler::find_chats_endpoint))
            .route(
                "/chats/stream",
                web::post().to(chat_handler::stream_chats_endpoint),
            )
            .route(
                "/messages",
                web::post().to(message_handler::find_messages_endpoint),
            )
            .route("/send-text", web::post().to(send_handler::send_text_endpoint))
            .route(
                "/send-media",
                web::post().to(send_handler::send_media_endpoint),
            )
            .route(
                "/send-buttons",
                web::post().to(send_handler::send_buttons_endpoint),
            )
            .route("/send-list", web::post().to(send_handler::send_list_endpoint))
            .route("/sse", web::get().to(realtime_handler::sse_endpoint))
            .route(
                "/instance/status",
                web::get().to(meta_handler::instance_status_endpoint),
            )
            .route("/labels", web::get().to(meta_handler::labels_endpoint))
            .route(
                "/chat/name-image",
                web::get().to(meta_handler::name_image_get_endpoint),
            )
            .route(
                "/chat/name-image",
                web::post().to(meta_handler::name_image_post_endpoint),
            )
            .service(
                web::scope("/media")
                    .route("/proxy", web::get().to(media_handler::media_proxy_endpoint))
                    .route(
                        "/resolve",
                        web::post().to(media_handler::media_resolve_endpoint),
                    ),
            )
            .route(
                "/lead-status",
                web::get().to(stage_handler::get_lead_status_endpoint),
            )
            .route(
                "/lead-status/bulk",
                web::post().to(stage_handler::bulk_lead_status_endpoint),
            )
            .route(
                "/stage/classify",
                web::post().to(stage_handler::stage_classify_endpoint),
            )
            .service(
                web::scope("/crm")
                    .route("/views", web::get().to(crm_handler::crm_views_endpoint))
                    .route("/list", web::get().to(crm_handler::crm_list_endpoint))
                    .route("/item", web::get().to(crm_handler::crm_item_endpoint))
                    .route("/status", web::post().to(crm_handler::crm_set_status_endpoint))
                    .route(
                        "/status",
                        web::delete().to(crm_handler::crm_clear_status_endpoint),
                    )
                    .route("/sync", web::post().to(crm_handler::crm_sync_endpoint)),
            )
            .service(
                web::scope("/billing")
                    .route(
                        "/register-trial",
                        web::post().to(billing_handler::register_trial_endpoint),
                    )
                    .route(
                        "/status",
                        web::get().to(billing_handler::billing_status_endpoint),
                    ),
            )
            .service(
                web::scope("/pay/stripe")
                    .route(
                        "/checkout",
                        web::post().to(payment_handler::stripe_checkout_endpoint),
                    )
                    .route(
                        "/checkout-url",
                        web::get().to(payment_handler::stripe_checkout_url_endpoint),
                    )
                    .route(
                        "/webhook",
                        web::post().to(payment_handler::stripe_webhook_endpoint),
                    ),
            )
            .service(
                web::scope("/pay/getnet")
                    .route(
                        "/checkout",
                        web::post().to(payment_handler::getnet_checkout_endpoint),
                    )
                    .route(
                        "/checkout-url",
                        web::get().to(payment_handler::getnet_checkout_url_endpoint),
                    )
                    .route(
                        "/pay-direct",
                        web::post().to(payment_handler::getnet_pay_direct_endpoint),
                    )
                    .route(
                        "/webhook",
                        web::post().to(payment_handler::getnet_webhook_endpoint),
                    )
                    .route(
                        "/status",
                        web::get().to(payment_handler::getnet_status_endpoint),
                    ),
            )
            .service(
                web::scope("/uaz")
                    .route(
                        "/instance",
                        web::post().to(instance_handler::create_instance_endpoint),
                    )
                    .route(
                        "/instance/qr",
                        web::get().to(instance_handler::instance_qr_endpoint),
                    )
                    .route(
                        "/instance/status",
                        web::get().to(instance_handler::instance_status_by_name_endpoint),
                    )
                    .route(
                        "/webhook",
                        web::post().to(instance_handler::instance_webhook_endpoint),
                    ),
            ),
    );
}
