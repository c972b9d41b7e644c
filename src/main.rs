use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use resourcehub_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{StripeService, create_mail_client},
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    tasks,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().map_err(|e| {
        std::io::Error::other(format!("Failed to load configuration file: {e}"))
    })?;

    // 创建数据库连接池
    let pool = create_pool(&config.database).await.map_err(|e| {
        std::io::Error::other(format!("Failed to create database connection pool: {e}"))
    })?;

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to run database migrations: {e}")))?;

    // 创建JWT服务 (校验认证服务签发的访问令牌)
    let jwt_service = JwtService::new(&config.jwt.secret);

    // 创建外部服务
    let stripe_service = StripeService::new(config.stripe.clone());
    let mail_client = create_mail_client(&config.mail);

    // 创建服务
    let product_service = ProductService::new(pool.clone());
    let coupon_service = CouponService::new(pool.clone());
    let order_service = OrderService::new(pool.clone());
    let checkout_service = CheckoutService::new(
        pool.clone(),
        stripe_service.clone(),
        order_service.clone(),
        mail_client.clone(),
        config.site.clone(),
    );
    let resource_service = ResourceService::new(pool.clone(), mail_client.clone());
    let ad_service = AdService::new(pool.clone());
    let notifier_service =
        NotifierService::new(pool.clone(), mail_client.clone(), config.site.clone());

    // 启动每日到期提醒任务
    tasks::spawn_all(notifier_service.clone(), config.notifier.clone());

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let site = config.site.clone();
    let notifier_config = config.notifier.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors(&site))
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .app_data(web::Data::new(product_service.clone()))
            .app_data(web::Data::new(coupon_service.clone()))
            .app_data(web::Data::new(order_service.clone()))
            .app_data(web::Data::new(checkout_service.clone()))
            .app_data(web::Data::new(resource_service.clone()))
            .app_data(web::Data::new(ad_service.clone()))
            .app_data(web::Data::new(notifier_service.clone()))
            .app_data(web::Data::new(stripe_service.clone()))
            .app_data(web::Data::new(notifier_config.clone()))
            .configure(swagger_config)
            .configure(handlers::webhook_config)
            .configure(handlers::cron_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::product_config)
                    .configure(handlers::resource_config)
                    .configure(handlers::ad_config)
                    .configure(handlers::coupon_config)
                    .configure(handlers::checkout_config)
                    .configure(handlers::order_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
