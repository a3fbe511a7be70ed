use contexture::binding::BindingScope;
use contexture::context::Context;
use contexture::error::ResolutionError;
use contexture::inject::Injection;
use contexture::provide::{Instantiate, InstantiationArgs};
use contexture::resolver::Getter;
use contexture::value::downcast;

struct Greeter {
    greeting: String,
    // bound only after this instance is constructed, so it is injected as a
    // deferred getter
    audience: Getter,
}

impl Instantiate for Greeter {
    fn instantiate(args: InstantiationArgs) -> Result<Self, ResolutionError> {
        Ok(Self {
            greeting: args.argument_cloned::<String>(0)?,
            audience: args.argument_cloned::<Getter>(1)?,
        })
    }
}

impl Greeter {
    fn greet(&self) -> Result<String, ResolutionError> {
        let audience = self
            .audience
            .get()?
            .into_sync("greeting.audience")
            .and_then(downcast::<String>)?;

        Ok(format!("{}, {}!", self.greeting, audience))
    }
}

fn main() {
    let ctx = Context::new("app");

    ctx.injections()
        .register_parameter::<Greeter>(None, 0, Injection::key("greeting.text"));
    ctx.injections()
        .register_parameter::<Greeter>(None, 1, Injection::getter("greeting.audience"));

    ctx.bind("greeting.text").to("hello".to_string());
    ctx.bind("greeter")
        .to_class::<Greeter>()
        .in_scope(BindingScope::Singleton);

    let greeter = downcast::<Greeter>(ctx.get_sync("greeter").unwrap()).unwrap();

    // the audience key becomes bound only now, after construction
    ctx.bind("greeting.audience").to("world".to_string());

    println!("{}", greeter.greet().unwrap());
}
