use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming as IncomingBody;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;
use tracing::{debug, info};

use tracelog::config::Config;
use tracelog::core::{Context, Error, Request, Response};
use tracelog::logging::init_subscriber;
use tracelog::middleware::MiddlewareChain;
use tracelog::observability::{trace_scope, Telemetry};
use tracelog::timer::time_future;
use tracelog::{log_event, Level, Logger, Scope, Tags};

struct App {
    chain: MiddlewareChain,
    logger: Arc<Logger>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;

    let telemetry = Telemetry::init(&config)?;
    let tracer = config
        .otel
        .is_enabled()
        .then(|| telemetry.tracer().clone());
    init_subscriber(&config.logging, tracer)?;
    config.log_summary();

    let chain = MiddlewareChain::new().add(telemetry.middleware());
    info!(middleware = ?chain.names(), "Middleware chain ready");

    let app = Arc::new(App {
        chain,
        logger: telemetry.logger(),
    });

    let listener = TcpListener::bind(config.server.listen_addr).await?;
    info!("Listening on http://{}", config.server.listen_addr);

    tokio::select! {
        result = serve(listener, app) => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    telemetry.shutdown()?;
    Ok(())
}

async fn serve(
    listener: TcpListener,
    app: Arc<App>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        let (stream, remote_addr) = listener.accept().await?;
        let _ = stream.set_nodelay(true);
        let app = Arc::clone(&app);

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let app = Arc::clone(&app);
                async move { handle_request(req, remote_addr, app).await }
            });

            let io = TokioIo::new(stream);
            if let Err(err) = auto::Builder::new(TokioExecutor::new())
                .serve_connection(io, service)
                .await
            {
                debug!("Connection error: {:?}", err);
            }
        });
    }
}

async fn handle_request(
    req: http::Request<IncomingBody>,
    remote_addr: SocketAddr,
    app: Arc<App>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("Failed to read request body: {}", e);
            Bytes::new()
        }
    };
    let req = Request::from(http::Request::from_parts(parts, body));
    let mut ctx = Context::new(remote_addr.ip());

    let logger = Arc::clone(&app.logger);
    let result = app
        .chain
        .try_process_async(req, &mut ctx, |req, ctx| {
            let scope = trace_scope(ctx);
            async move { route(req, scope, logger).await }
        })
        .await;

    let res = match result {
        Ok(res) => res,
        Err(err) => {
            app.logger.log_error(&trace_scope(&ctx), &err, &[]);
            let mut res = Response::internal_error("Internal Server Error");
            for (name, value) in ctx.response_headers() {
                res = res.with_header(name, value);
            }
            res
        }
    };

    let tags = Tags::new()
        .with("status", res.status().as_u16())
        .with("client_ip", ctx.client_ip.to_string())
        .with("duration_ms", ctx.elapsed().as_millis() as u64);
    log_event!(app.logger, &trace_scope(&ctx), Level::Debug, tags = &tags; "request finished");

    let res: http::Response<Bytes> = res.into();
    Ok(res.map(Full::new))
}

async fn route(req: Request, scope: Scope, logger: Arc<Logger>) -> Result<Response, Error> {
    let scope = scope.with_tag("path", req.path());

    match req.path() {
        "/" => {
            let tags = Tags::new().with("user_agent", req.user_agent().unwrap_or("-"));
            log_event!(logger, &scope, Level::Info, tags = &tags; "hello from {}", req.method());
            Ok(Response::ok("hello\n"))
        }
        "/slow" => {
            let ((), elapsed) = time_future(tokio::time::sleep(Duration::from_millis(25))).await;
            let tags = Tags::new().with("elapsed_ms", elapsed.as_millis() as u64);
            log_event!(logger, &scope, Level::Warn, tags = &tags; "slow path");
            Ok(Response::ok("slow\n"))
        }
        "/echo" if req.method() == http::Method::POST => {
            let echo = serde_json::json!({
                "version": format!("{:?}", req.version()),
                "query": req.query_pairs(),
                "bytes": req.body().len(),
                "body": String::from_utf8_lossy(req.body()),
            });
            logger.info(&scope.with_tag("bytes", req.body().len()), "echo");
            Ok(Response::builder().json().body(echo.to_string()).build())
        }
        "/fail" => Err(Error::from("simulated failure")),
        _ => {
            logger.debug(&scope, "no route");
            Ok(Response::empty(http::StatusCode::NOT_FOUND))
        }
    }
}
