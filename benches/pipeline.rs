use std::sync::Arc;
use std::time::Duration;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures_util::FutureExt;
use plugbot::codec::{self, Inbound};
use plugbot::dispatch::{Callback, Dispatcher};
use plugbot::session::{Person, Privilege, Roster};
use plugbot::{Action, ActionMap, Event, EventKind};
use plugbot_proto::Message;

const LINE: &str = ":alice!a@alice.host PRIVMSG #bench :hello there, how is everyone";

fn roster() -> Roster {
    let mut roster = Roster::new();
    roster.upsert(Person::new("alice").with_privilege(Privilege::Voice));
    for i in 0..50 {
        roster.upsert(Person::new(format!("user{i}")));
    }
    roster
}

fn classify_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    group.throughput(Throughput::Bytes(LINE.len() as u64));
    let roster = roster();

    group.bench_function("parse_and_classify_privmsg", |b| {
        b.iter(|| {
            let msg: Message = LINE.parse().unwrap();
            codec::classify(msg, "plugbot", &roster).unwrap()
        })
    });

    group.finish();
}

fn dispatch_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let mut dispatcher = Dispatcher::new(Duration::from_secs(1));
    for i in 0..8 {
        let callback: Callback = Arc::new(move |event: Event| {
            let mut actions = ActionMap::new();
            if i % 4 == 0 {
                actions.push(Action::send_message(format!("{} said something", event.person().nick)));
            }
            futures_util::future::ready(Ok(actions)).boxed()
        });
        dispatcher.register(EventKind::Message, &format!("plugin{i}"), callback);
    }

    let msg: Message = LINE.parse().unwrap();
    let Inbound::Event(event) = codec::classify(msg, "plugbot", &roster()).unwrap() else {
        panic!("PRIVMSG should classify as an event");
    };

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));
    group.bench_function("eight_subscribers", |b| {
        b.to_async(&runtime).iter(|| dispatcher.dispatch(&event))
    });
    group.finish();
}

criterion_group!(benches, classify_benchmark, dispatch_benchmark);
criterion_main!(benches);
