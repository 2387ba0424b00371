mod common;
use common::*;

use goodwe_bridge::coordinator::Coordinator;
use goodwe_bridge::error::TransportError;

const SERIAL: &str = "SN123";

struct Setup {
    mock: MockTransport,
    cache: IdentityCache,
    coordinator: Coordinator,
    to_mqtt: broadcast::Receiver<mqtt::ChannelData>,
}

fn setup(units: Vec<LogicalUnit>) -> Setup {
    common_setup();

    let mock = MockTransport::new();
    let cache = IdentityCache::new();
    let channels = Channels::new();
    let to_mqtt = channels.to_mqtt.subscribe();
    let coordinator = Coordinator::new(channels, Factory::arbiter(&mock), cache.clone(), units);

    Setup {
        mock,
        cache,
        coordinator,
        to_mqtt,
    }
}

fn et_setup() -> Setup {
    let s = setup(vec![Factory::et_unit(1)]);
    s.cache.set(1, Serial::from(SERIAL));
    s
}

#[tokio::test(start_paused = true)]
async fn query_publishes_value_read_back() -> Result<()> {
    let mut s = et_setup();
    s.mock.set_registers(1, 45356, &[20]);

    s.coordinator
        .process_message(mqtt_message("SN123/socminongrid", ""))
        .await?;

    assert_eq!(
        s.mock.ops(),
        vec![MockOp::Read {
            unit: 1,
            address: 45356,
            count: 1
        }]
    );
    let reply = next_published(&mut s.to_mqtt);
    assert_eq!(reply.topic, "SN123/socminongrid/result");
    assert_eq!(reply.payload, "20");
    assert!(!reply.retain);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unknown_serial_touches_nothing() -> Result<()> {
    let mut s = et_setup();

    s.coordinator
        .process_message(mqtt_message("SN999/socminongrid/set", "50"))
        .await?;

    assert!(s.mock.ops().is_empty());
    let reply = next_published(&mut s.to_mqtt);
    assert_eq!(reply.topic, "SN999/socminongrid/result");
    assert_eq!(reply.payload, "failed: unknown serial SN999");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn write_publishes_accepted_value() -> Result<()> {
    let mut s = et_setup();

    s.coordinator
        .process_message(mqtt_message("SN123/set/socminoffgrid", "15"))
        .await?;

    assert_eq!(s.mock.writes(), vec![(45358, vec![15])]);
    let reply = next_published(&mut s.to_mqtt);
    assert_eq!(reply.topic, "SN123/result/socminoffgrid");
    assert_eq!(reply.payload, "15");

    // and reads back
    s.coordinator
        .process_message(mqtt_message("SN123/socminoffgrid", ""))
        .await?;
    assert_eq!(next_published(&mut s.to_mqtt).payload, "15");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn out_of_range_is_rejected_before_io() -> Result<()> {
    let mut s = et_setup();

    s.coordinator
        .process_message(mqtt_message("SN123/chargeforcegrid/set", "2"))
        .await?;

    assert!(s.mock.ops().is_empty());
    let reply = next_published(&mut s.to_mqtt);
    assert_eq!(reply.payload, "failed: chargeforcegrid: value 2 out of range");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unknown_command_and_bad_payload() -> Result<()> {
    let mut s = et_setup();

    s.coordinator
        .process_message(mqtt_message("SN123/selfdestruct", "1"))
        .await?;
    assert_eq!(
        next_published(&mut s.to_mqtt).payload,
        "failed: unknown command selfdestruct"
    );

    s.coordinator
        .process_message(mqtt_message("SN123/socminongrid", "lots"))
        .await?;
    assert_eq!(
        next_published(&mut s.to_mqtt).payload,
        "failed: invalid payload \"lots\""
    );

    s.coordinator
        .process_message(mqtt_message("SN123/soc", "50"))
        .await?;
    assert_eq!(
        next_published(&mut s.to_mqtt).payload,
        "failed: soc is read-only"
    );

    assert!(s.mock.ops().is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn fractional_write_to_integer_register_is_rejected() -> Result<()> {
    let mut s = et_setup();

    s.coordinator
        .process_message(mqtt_message("SN123/socminongrid/set", "55.7"))
        .await?;

    assert!(s.mock.ops().is_empty());
    assert_eq!(
        next_published(&mut s.to_mqtt).payload,
        "failed: invalid payload \"55.7\""
    );
    assert!(s.to_mqtt.try_recv().is_err());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn non_utf8_payload_gets_a_failure_reply() -> Result<()> {
    let mut s = et_setup();

    let config = ConfigWrapper::from_config(Config::from_yaml(
        "transport:\n  serial: /dev/ttyS0\nunits:\n  - address: 1\n    type: ET\nmqtt:\n  host: localhost\n",
    )?);
    let channels = Channels::new();
    let mut from_mqtt = channels.from_mqtt.subscribe();
    let client = mqtt::Mqtt::new(config, channels);

    client.handle_message(rumqttc::Publish::new(
        "GoodWe/SN123/socminongrid/set",
        rumqttc::QoS::AtMostOnce,
        vec![0xFF, 0x35],
    ))?;

    let message = match from_mqtt.try_recv()? {
        mqtt::ChannelData::Message(message) => message,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(message.topic, "SN123/socminongrid/set");

    s.coordinator.process_message(message).await?;

    assert!(s.mock.ops().is_empty());
    let reply = next_published(&mut s.to_mqtt);
    assert_eq!(reply.topic, "SN123/socminongrid/result");
    assert!(reply.payload.starts_with("failed: invalid payload"));
    assert!(s.to_mqtt.try_recv().is_err());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn non_command_topics_get_no_reply() -> Result<()> {
    let mut s = et_setup();

    s.coordinator
        .process_message(mqtt_message("SN123/socminongrid/result", "20"))
        .await?;

    assert!(s.to_mqtt.try_recv().is_err());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn trigger_commands() -> Result<()> {
    let mut s = setup(vec![Factory::dt_unit(3)]);
    s.cache.set(3, Serial::from("DT1"));

    s.coordinator
        .process_message(mqtt_message("DT1/rapidcutoff", "1"))
        .await?;
    s.coordinator
        .process_message(mqtt_message("DT1/rapidcutoff", "0"))
        .await?;
    assert_eq!(s.mock.writes(), vec![(121, vec![0]), (120, vec![0])]);
    assert_eq!(next_published(&mut s.to_mqtt).payload, "1");
    assert_eq!(next_published(&mut s.to_mqtt).payload, "0");

    s.coordinator
        .process_message(mqtt_message("DT1/rapidcutoff", ""))
        .await?;
    assert_eq!(
        next_published(&mut s.to_mqtt).payload,
        "failed: rapidcutoff can't be queried"
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn fatal_transport_error_is_reported_then_propagated() -> Result<()> {
    let mut s = et_setup();
    s.mock
        .fail_at(1, 45356, TransportError::connection_lost("broken pipe"));

    let result = s
        .coordinator
        .process_message(mqtt_message("SN123/socminongrid", "30"))
        .await;

    assert!(result.is_err());
    let reply = next_published(&mut s.to_mqtt);
    assert_eq!(reply.payload, "failed: connection lost: broken pipe");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn protocol_error_is_only_reported() -> Result<()> {
    let mut s = et_setup();
    s.mock
        .fail_at(1, 45356, TransportError::protocol("illegal data value"));

    s.coordinator
        .process_message(mqtt_message("SN123/socminongrid", "30"))
        .await?;

    let reply = next_published(&mut s.to_mqtt);
    assert_eq!(reply.payload, "failed: protocol error: illegal data value");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn grid_loss_triggers_availability_actions() -> Result<()> {
    let mut s = setup(vec![
        Factory::et_unit(1),
        Factory::dt_unit(2),
        Factory::et_unit(3),
    ]);
    s.cache.set(1, Serial::from("ET1"));
    s.cache.set(2, Serial::from("DT2"));
    // unit 3 not identified yet

    s.coordinator
        .process_availability(mqtt_message("NA/0/state", "0"))
        .await?;

    assert_eq!(
        s.mock.ops(),
        vec![
            MockOp::Write {
                unit: 1,
                address: 45255,
                values: vec![1]
            },
            MockOp::Write {
                unit: 2,
                address: 120,
                values: vec![0]
            },
        ]
    );
    assert_eq!(next_published(&mut s.to_mqtt).topic, "ET1/rapidcutoff/result");
    assert_eq!(next_published(&mut s.to_mqtt).topic, "DT2/rapidcutoff/result");

    s.coordinator
        .process_availability(mqtt_message("NA/0/state", "1"))
        .await?;
    assert_eq!(
        s.mock.writes()[2..].to_vec(),
        vec![(45255, vec![0]), (121, vec![0])]
    );

    Ok(())
}
