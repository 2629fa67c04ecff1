use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sp_engine::{ChannelPlayState, PlaybackScheduler};
use sp_ir::{Event, Pattern, PatternStreams, TimedEvent};

/// Four bars with a note on every channel at every eighth of a beat.
fn dense_streams() -> PatternStreams {
    let mut streams = PatternStreams::new();
    for channel in 0..16u8 {
        let stream = streams.channel_mut(channel).unwrap();
        for subdivision in (0..512u32).step_by(4) {
            let key = 36 + (subdivision / 4 % 24) as u8;
            stream.insert(TimedEvent {
                subdivision,
                tick: subdivision as u64 * 15,
                event: Event::NoteOn { channel, key, velocity: 100, length: 2 },
            });
            stream.insert(TimedEvent {
                subdivision: subdivision + 2,
                tick: (subdivision + 2) as u64 * 15,
                event: Event::NoteOff { channel, key, velocity: 0 },
            });
        }
    }
    streams
}

fn bench_pattern_pass(c: &mut Criterion) {
    let mut out: Vec<Event> = Vec::with_capacity(64);
    let mut sched = PlaybackScheduler::new();
    sched.load_pattern(&Pattern::new(), dense_streams(), &mut out);
    sched.set_looping(true);
    sched.play(&mut out);

    c.bench_function("tick_full_pattern", |b| {
        b.iter(|| {
            for _ in 0..sched.length() {
                out.clear();
                black_box(sched.tick(&mut out));
            }
        })
    });

    sched.set_channel_state(3, ChannelPlayState::Solo, &mut out);
    sched.set_channel_state(9, ChannelPlayState::Solo, &mut out);
    c.bench_function("tick_full_pattern_two_solo", |b| {
        b.iter(|| {
            for _ in 0..sched.length() {
                out.clear();
                black_box(sched.tick(&mut out));
            }
        })
    });
}

criterion_group!(benches, bench_pattern_pass);
criterion_main!(benches);
