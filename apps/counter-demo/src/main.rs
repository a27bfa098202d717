use std::time::Duration;

use redact_core::{use_state, Component, Element, Event, MemorySurface, Props, Root};
use redact_runtime_std::StdRuntime;

const DEFAULT_CLICKS: u32 = 3;

fn counter() -> Component {
    Component::new("Counter", |props: &Props| {
        let (count, set_count) = use_state(1);
        Element::host("div")
            .style("display", "flex")
            .style("flex-direction", "column")
            .style("align-items", "center")
            .child(
                Element::host("h1")
                    .on("click", move |_| set_count.update(|c| c + 1))
                    .style("user-select", "none")
                    .child("Count: ")
                    .child(count),
            )
            .child(props.children().to_vec())
    })
}

fn main() {
    env_logger::init();

    let clicks = match std::env::args().nth(1) {
        Some(arg) => match arg.parse() {
            Ok(clicks) => clicks,
            Err(err) => {
                log::error!("invalid click count {arg:?}: {err}");
                std::process::exit(2);
            }
        },
        None => DEFAULT_CLICKS,
    };

    println!("=== Redact Counter Example ===");
    println!("Simulating {clicks} clicks on the heading.");
    println!();

    let host = StdRuntime::new().with_frame_budget(Duration::from_millis(8));
    host.set_waker(|| log::trace!("idle callback requested"));
    let mut root = Root::with_runtime(MemorySurface::new(), host.runtime());
    let container = root.adapter_mut().create_container("root");

    root.render(
        Element::component(&counter()).child(Element::host("p").child("Child node")),
        container,
    );
    host.run_until_idle(&mut root);
    print!("{}", root.adapter().dump_tree(container));

    for _ in 0..clicks {
        let Some(&heading) = root.adapter().find_by_kind(container, "h1").first() else {
            log::error!("counter heading is missing");
            std::process::exit(1);
        };
        root.adapter().dispatch(heading, &Event::new("click"));
        let commits = host.run_until_idle(&mut root);
        println!("{} ({commits} commit)", root.adapter().text_content(container));
    }

    println!();
    print!("{}", root.adapter().dump_tree(container));
}
