use contexture::binding::BindingScope;
use contexture::context::Context;
use contexture::value::{downcast, ValueOrPromise};

fn main() {
    let ctx = Context::new("app");

    // constants are returned as-is on every get
    ctx.bind("config.host").to("localhost".to_string());
    ctx.bind("config.port").to(8080_i32);

    // factories run on resolution; singletons run once and cache the result
    // on the owning context
    ctx.bind("config.url")
        .to_provider(|ctx, session| {
            let host = ctx
                .get_with_session("config.host", session)
                .and_then(|value| value.into_sync("config.host"))
                .and_then(downcast::<String>)
                .expect("host is bound");
            let port = ctx
                .get_with_session("config.port", session)
                .and_then(|value| value.into_sync("config.port"))
                .and_then(downcast::<i32>)
                .expect("port is bound");

            ValueOrPromise::from_value(format!("http://{host}:{port}"))
        })
        .in_scope(BindingScope::Singleton);

    let url = downcast::<String>(ctx.get_sync("config.url").unwrap()).unwrap();
    println!("resolved url: {url}");

    // children delegate lookups upwards and can override locally
    let request = ctx.create_child("request");
    request.bind("config.port").to(9090_i32);
    println!(
        "request-local port: {}",
        downcast::<i32>(request.get_sync("config.port").unwrap()).unwrap()
    );

    // tags group bindings for fan-out lookup
    ctx.bind("middleware.cors").to(1_i32).tag("middleware");
    ctx.bind("middleware.auth").to(2_i32).tag("middleware");
    for binding in ctx.find_by_tag("middleware") {
        println!("middleware binding: {}", binding.key());
    }
}
