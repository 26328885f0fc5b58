//! End-to-end scheduler runs over a built topology

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::thread;
use std::time::{Duration, Instant};
use topology::{NodeRecord, TopologyDescription, TopologyGraph};
use workload::{
    DistributionSampler, DistributionSpec, InstantPacer, LinkEventScheduler, RealTimePacer,
    RecordingSink, ScheduleLine, SchedulerState, StopSignal, TrafficRole,
    TrafficScheduleGenerator, TrafficSpec, ValueSetSpec,
};

fn line_topology(count: usize) -> TopologyGraph {
    let mut description = TopologyDescription::new();
    for i in 1..=count {
        let mut record = NodeRecord::new(format!("node-{}", i));
        if i < count {
            record = record.neighbor(format!("node-{}", i + 1));
        }
        description.add_node("lab", record);
    }
    TopologyGraph::build(&description).unwrap()
}

fn constant(value: f64) -> DistributionSpec {
    DistributionSpec::single(ValueSetSpec::interval(vec![value]))
}

fn fixed_delay(value: f64) -> DistributionSampler {
    DistributionSampler::with_seed(&constant(value), 0).unwrap()
}

#[test]
fn test_two_node_run_emits_two_updates() {
    let graph = line_topology(2);
    assert_eq!(graph.links().len(), 1);

    let mut scheduler = LinkEventScheduler::new(
        graph.registry(),
        fixed_delay(1.0),
        2.5,
        InstantPacer::new(),
        RecordingSink::new(),
    )
    .unwrap()
    .with_rng(StdRng::seed_from_u64(7));

    let summary = scheduler.run().unwrap();
    assert_eq!(summary.epochs, 1);
    assert_eq!(summary.updates, 2);
    assert!(!summary.cancelled);

    let events = scheduler.sink().events();
    assert_eq!(events.len(), 4);
    let times: Vec<f64> = events.iter().map(|e| e.time_offset).collect();
    assert_eq!(times, vec![1.0, 1.0, 2.0, 2.0]);

    // The third delay crosses the duration and is paced but never emitted
    assert_eq!(scheduler.pacer().elapsed(), Duration::from_secs(3));
    for event in events {
        assert!([1, 2].contains(&event.node_a));
        assert!([1, 2].contains(&event.node_b));
    }
}

#[test]
fn test_every_epoch_runs_to_its_duration() {
    let graph = line_topology(4);
    let link_update = DistributionSpec::exponential(ValueSetSpec::range(1, 4, 1));
    let sampler = DistributionSampler::with_seed(&link_update, 5).unwrap();

    let mut scheduler = LinkEventScheduler::new(
        graph.registry(),
        sampler,
        30.0,
        InstantPacer::new(),
        RecordingSink::new(),
    )
    .unwrap()
    .with_rng(StdRng::seed_from_u64(5));

    let summary = scheduler.run().unwrap();
    assert_eq!(summary.epochs, 3);
    assert_eq!(scheduler.state(), SchedulerState::Finished);

    let events = scheduler.sink().events();
    assert_eq!(events.len(), summary.updates * 2);
    for event in events {
        assert!(event.epoch < 3);
        assert!(event.time_offset <= 30.0);
    }
}

#[test]
fn test_stop_signal_interrupts_real_time_run() {
    let graph = line_topology(3);
    let stop = StopSignal::new();
    let mut scheduler = LinkEventScheduler::new(
        graph.registry(),
        fixed_delay(60.0),
        600.0,
        RealTimePacer::new(stop.clone()),
        RecordingSink::new(),
    )
    .unwrap();

    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        stop.stop();
    });

    let start = Instant::now();
    let summary = scheduler.run().unwrap();
    stopper.join().unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.updates, 0);
    assert!(start.elapsed() < Duration::from_secs(30));
    assert!(scheduler.sink().events().is_empty());
}

#[test]
fn test_stop_between_events_keeps_completed_pairs() {
    struct StopAfter {
        inner: InstantPacer,
        stop: StopSignal,
        remaining: usize,
    }

    impl workload::Pacer for StopAfter {
        fn pause(&mut self, delay: Duration) -> workload::Pace {
            if self.remaining == 0 {
                self.stop.stop();
            } else {
                self.remaining -= 1;
            }
            self.inner.pause(delay)
        }
    }

    let stop = StopSignal::new();
    let pacer = StopAfter {
        inner: InstantPacer::new().with_stop(stop.clone()),
        stop,
        remaining: 3,
    };
    let mut scheduler = LinkEventScheduler::new(
        line_topology(3).registry(),
        fixed_delay(1.0),
        100.0,
        pacer,
        RecordingSink::new(),
    )
    .unwrap();

    let summary = scheduler.run().unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.updates, 3);
    assert_eq!(scheduler.sink().events().len(), 6);
}

#[test]
fn test_one_source_one_sink_traffic() {
    let graph = line_topology(2);
    let registry = graph.registry();
    assert_eq!(TrafficRole::of(registry[0].nem_id), TrafficRole::Source);
    assert_eq!(TrafficRole::of(registry[1].nem_id), TrafficRole::Sink);

    let spec = TrafficSpec::new(constant(1.0), constant(512.0), constant(64.0));
    let mut generator = TrafficScheduleGenerator::new(spec, 3.0, StdRng::seed_from_u64(3)).unwrap();
    let plan = generator.generate(&registry).unwrap();

    let source = plan.schedule("node-1").unwrap();
    assert_eq!(source.flows.len(), 3);

    let mut starts: HashMap<u64, f64> = HashMap::new();
    for line in source.lines() {
        match line {
            ScheduleLine::On { flow, .. } => {
                assert_eq!(flow.destination, Ipv4Addr::new(10, 100, 0, 2));
                starts.insert(flow.flow_id, flow.start_time);
            }
            ScheduleLine::Off { time, flow_id } => {
                let start = starts[&flow_id];
                assert!(time > start);
            }
            other => panic!("unexpected source line {:?}", other),
        }
    }
    assert_eq!(starts.len(), 3);

    let start_times: Vec<f64> = source.flows.iter().map(|f| f.start_time).collect();
    assert_eq!(start_times, vec![1.0, 2.0, 3.0]);

    let sink = plan.schedule("node-2").unwrap();
    assert_eq!(sink.listen_until, Some(6.0));
}

#[test]
fn test_source_time_carries_over_epochs() {
    let graph = line_topology(2);
    let arrival = DistributionSpec::single(ValueSetSpec::interval(vec![2.0, 2.0]));
    let spec = TrafficSpec::new(arrival, constant(512.0), constant(64.0));
    let mut generator = TrafficScheduleGenerator::new(spec, 5.0, StdRng::seed_from_u64(3)).unwrap();
    let plan = generator.generate(&graph.registry()).unwrap();

    // Two epochs of arrivals at 2 and 4; the crossing draw still advances the clock
    let starts: Vec<f64> = plan.schedule("node-1").unwrap().flows.iter().map(|f| f.start_time).collect();
    assert_eq!(starts, vec![2.0, 4.0, 8.0, 10.0]);
}

#[test]
fn test_write_schedule_files() {
    let graph = line_topology(3);
    let spec = TrafficSpec::new(constant(1.0), constant(600.0), constant(100.0));
    let mut generator = TrafficScheduleGenerator::new(spec, 2.0, StdRng::seed_from_u64(1)).unwrap();
    let plan = generator.generate(&graph.registry()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let written = plan.write_to_dir(dir.path()).unwrap();
    assert_eq!(written.len(), 3);

    let sink = std::fs::read_to_string(dir.path().join("node-2").join("mgen.in")).unwrap();
    assert_eq!(sink, "0.00 LISTEN UDP 5001\n4.00 IGNORE UDP 5001\n");

    let source = std::fs::read_to_string(dir.path().join("node-3").join("mgen.in")).unwrap();
    let lines: Vec<&str> = source.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("1.00 ON "));
    assert!(lines[0].ends_with("DST 10.100.0.2/5001 PERIODIC [128 600]"));
    assert!(lines[1].ends_with(&format!("OFF {}", plan.schedule("node-3").unwrap().flows[0].flow_id)));
}
