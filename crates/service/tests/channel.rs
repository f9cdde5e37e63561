use anyhow::Result;
use codec::Packet;
use rtpchat_service::{
    Channel, Error,
    fragment::{CHUNK_ID, DESCRIPTOR_ID, FragmentInfo, MAX_CHUNK_SIZE, MAX_FRAGMENTS},
    reassembly::ReassemblyBuffer,
};

fn descriptor(packet: &Packet) -> FragmentInfo {
    let extensions = packet.extensions.as_ref().expect("fragment packet");
    FragmentInfo::try_from(extensions.get(DESCRIPTOR_ID).expect("descriptor element"))
        .expect("4-byte descriptor")
}

#[test]
fn test_single_packet_round_trip() -> Result<()> {
    let sender = Channel::new();
    let receiver = Channel::new();

    for size in [1usize, 250, 251] {
        let message = vec![0x42u8; size];
        let packets = sender.send(&message)?;
        assert_eq!(packets.len(), 1);

        // No descriptor on a single-packet message: the whole message
        // rides in the descriptor slot and there is no chunk element.
        let packet = Packet::try_from(&packets[0][..])?;
        let extensions = packet.extensions.as_ref().expect("extension bit set");
        assert_eq!(extensions.get(DESCRIPTOR_ID), Some(&message[..]));
        assert_eq!(extensions.get(CHUNK_ID), None);
        assert!(!packet.marker);

        let delivery = receiver.recv(&packets[0])?.expect("complete immediately");
        assert_eq!(delivery.message, message);
        assert_eq!(delivery.ssrc, sender.ssrc());
    }

    Ok(())
}

#[test]
fn test_fragmented_round_trip() -> Result<()> {
    let sender = Channel::new();
    let receiver = Channel::new();

    for size in [252usize, 503, 1000, 4096] {
        let message: Vec<u8> = (0..size).map(|i| i as u8).collect();
        let packets = sender.send(&message)?;
        assert_eq!(packets.len(), size.div_ceil(MAX_CHUNK_SIZE));

        let mut delivered = None;
        for (i, packet) in packets.iter().enumerate() {
            let result = receiver.recv(packet)?;
            if i + 1 < packets.len() {
                assert!(result.is_none());
            } else {
                delivered = result;
            }
        }

        assert_eq!(delivered.expect("last fragment completes").message, message);
    }

    Ok(())
}

#[test]
fn test_three_hundred_bytes_across_two_packets() -> Result<()> {
    let sender = Channel::new();
    let receiver = Channel::new();

    let message = vec![b'A'; 300];
    let packets = sender.send(&message)?;
    assert_eq!(packets.len(), 2);

    let first = Packet::try_from(&packets[0][..])?;
    let second = Packet::try_from(&packets[1][..])?;

    assert_eq!(descriptor(&first), FragmentInfo { index: 0, total: 2 });
    assert_eq!(descriptor(&second), FragmentInfo { index: 1, total: 2 });
    assert!(!first.marker);
    assert!(second.marker);

    let chunks = (
        first.extensions.as_ref().unwrap().get(CHUNK_ID).unwrap(),
        second.extensions.as_ref().unwrap().get(CHUNK_ID).unwrap(),
    );
    assert_eq!(chunks.0, &message[..251]);
    assert_eq!(chunks.1, &message[251..]);
    assert_eq!(chunks.1.len(), 49);

    // Reverse arrival order: completion happens on the second call.
    assert!(receiver.recv(&packets[1])?.is_none());
    let delivery = receiver.recv(&packets[0])?.expect("second call completes");
    assert_eq!(delivery.message, message);

    Ok(())
}

#[test]
fn test_any_permutation_reassembles() -> Result<()> {
    let sender = Channel::new();
    let message: Vec<u8> = (0..1000).map(|i| (i * 7) as u8).collect();
    let packets = sender.send(&message)?;
    assert_eq!(packets.len(), 4);

    for order in [[3, 1, 0, 2], [2, 3, 1, 0], [0, 1, 2, 3], [1, 0, 3, 2]] {
        let receiver = Channel::new();
        let mut deliveries = 0;

        for (fed, index) in order.iter().enumerate() {
            match receiver.recv(&packets[*index])? {
                Some(delivery) => {
                    assert_eq!(fed, order.len() - 1, "complete only on the last index");
                    assert_eq!(delivery.message, message);
                    deliveries += 1;
                }
                None => assert!(fed < order.len() - 1),
            }
        }

        assert_eq!(deliveries, 1);
    }

    Ok(())
}

#[test]
fn test_duplicate_fragment_does_not_advance_completion() -> Result<()> {
    let sender = Channel::new();
    let receiver = Channel::new();

    let message = vec![0x5au8; 300];
    let packets = sender.send(&message)?;
    assert_eq!(packets.len(), 2);

    assert!(receiver.recv(&packets[0])?.is_none());
    assert!(receiver.recv(&packets[0])?.is_none());

    let delivery = receiver.recv(&packets[1])?.expect("distinct index completes");
    assert_eq!(delivery.message, message);

    Ok(())
}

#[test]
fn test_buffer_reuse_across_messages() -> Result<()> {
    let sender = Channel::new();
    let receiver = Channel::new();

    let first = vec![0x01u8; 600];
    let packets = sender.send(&first)?;
    assert_eq!(packets.len(), 3);
    assert!(receiver.recv(&packets[0])?.is_none());
    assert!(receiver.recv(&packets[1])?.is_none());
    assert_eq!(receiver.recv(&packets[2])?.expect("completes").message, first);

    // A fresh session with a different fragment count right after.
    let second = vec![0x02u8; 300];
    let packets = sender.send(&second)?;
    assert!(receiver.recv(&packets[0])?.is_none());
    assert_eq!(receiver.recv(&packets[1])?.expect("completes").message, second);

    Ok(())
}

#[test]
fn test_sequence_and_timestamp_monotonicity() -> Result<()> {
    let sender = Channel::new();

    let first_packets = sender.send(b"x")?;
    let first = Packet::try_from(&first_packets[0][..])?;
    let (sequence, timestamp) = (first.sequence_number, first.timestamp);

    let mut sent = 1u32;
    for _ in 0..20 {
        for packet in sender.send(&vec![0u8; 700])? {
            let packet = Packet::try_from(&packet[..])?;
            assert_eq!(
                packet.sequence_number,
                sequence.wrapping_add(sent as u16)
            );
            assert_eq!(packet.timestamp, timestamp.wrapping_add(960 * sent));
            sent += 1;
        }
    }

    Ok(())
}

#[test]
fn test_send_rejections() {
    let sender = Channel::new();

    assert_eq!(sender.send(b"").unwrap_err(), Error::EmptyMessage);

    let oversized = vec![0u8; MAX_CHUNK_SIZE * MAX_FRAGMENTS + 1];
    assert_eq!(sender.send(&oversized).unwrap_err(), Error::MessageTooLarge);
}

#[test]
fn test_reassembly_validation() {
    let buffer = ReassemblyBuffer::default();

    // Descriptor must decode to exactly four bytes.
    assert_eq!(
        buffer.process(&[0, 0, 0], b"data").unwrap_err(),
        Error::InvalidFragmentInfo
    );

    // Chunks must carry data.
    let info = FragmentInfo { index: 0, total: 2 }.encode();
    assert_eq!(
        buffer.process(&info, b"").unwrap_err(),
        Error::EmptyFragmentData
    );

    // A disagreeing total rejects the packet but keeps the session.
    assert!(buffer.process(&info, b"first").unwrap().is_none());
    let conflicting = FragmentInfo { index: 1, total: 3 }.encode();
    assert_eq!(
        buffer.process(&conflicting, b"second").unwrap_err(),
        Error::InconsistentTotalFragments
    );

    // The session survived intact and a consistent resend completes it.
    let second = FragmentInfo { index: 1, total: 2 }.encode();
    let message = buffer.process(&second, b"second").unwrap().expect("completes");
    assert_eq!(message, b"firstsecond");
}

#[test]
fn test_out_of_range_index_reports_missing_fragment() {
    let buffer = ReassemblyBuffer::default();

    let info = FragmentInfo { index: 0, total: 2 }.encode();
    assert!(buffer.process(&info, b"zero").unwrap().is_none());

    // Two distinct indices match the expected count, but index 1 is a
    // hole because index 5 landed outside the message.
    let stray = FragmentInfo { index: 5, total: 2 }.encode();
    assert_eq!(
        buffer.process(&stray, b"stray").unwrap_err(),
        Error::MissingFragment
    );
}

#[test]
fn test_largest_possible_message_round_trip() -> Result<()> {
    let sender = Channel::new();
    let receiver = Channel::new();

    let message = vec![0xa5u8; MAX_CHUNK_SIZE * MAX_FRAGMENTS];
    let packets = sender.send(&message)?;
    assert_eq!(packets.len(), MAX_FRAGMENTS);

    let mut delivered = None;
    for packet in &packets {
        if let Some(delivery) = receiver.recv(packet)? {
            delivered = Some(delivery);
        }
    }

    assert!(delivered.expect("last fragment completes").message == message);

    Ok(())
}
