use crate::*;

const PACKET_SIZE: u16 = 64;

// ══════════════════════════════════════════════════════════════════════════════
//  Successful transfers
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_clean_stream_is_received_byte_for_byte() {
    let dir = TestDir::new("clean");
    let output = dir.join("received.bin");
    let content = test_content(1_000);
    let broadcast = Broadcast::new(&content, PACKET_SIZE);

    let summary = receive_frames(broadcast.clean_frames(), &output).unwrap();

    assert_eq!(fs::read(&output).unwrap(), content);
    assert_eq!(summary.packets, 18);
    assert_eq!(summary.bytes, 1_000);
    assert_eq!(summary.digest, broadcast.header.content_hash);
    assert_eq!(summary.output, output);
    assert_eq!(summary.frames_read, 19);
    assert_eq!(summary.duplicates, 0);
    assert_eq!(dir.entries(), 1, "temporary file left behind");
}

#[test]
fn test_unreadable_and_repeated_frames_are_tolerated() {
    let dir = TestDir::new("noisy");
    let output = dir.join("received.bin");
    let content = test_content(300);
    let b = Broadcast::new(&content, PACKET_SIZE);
    assert_eq!(b.packets.len(), 6);

    // Sender shows each packet for several frames; the camera misses some.
    let frames = vec![
        blank_frame(),
        blank_frame(),
        b.header_frame(),
        b.header_frame(),
        b.data_frame(0),
        blank_frame(),
        b.data_frame(0),
        b.header_frame(),
        b.data_frame(1),
        b.data_frame(2),
        b.data_frame(1),
        blank_frame(),
        b.data_frame(3),
        b.data_frame(4),
        b.data_frame(4),
        b.data_frame(5),
    ];
    let summary = receive_frames(frames, &output).unwrap();

    assert_eq!(fs::read(&output).unwrap(), content);
    assert_eq!(summary.frames_read, 16);
    assert_eq!(summary.frames_undecodable, 4);
    // Three repeated data packets and two header repeats.
    assert_eq!(summary.duplicates, 5);
}

#[test]
fn test_frames_after_last_packet_are_not_read() {
    let dir = TestDir::new("trailing");
    let output = dir.join("received.bin");
    let content = test_content(120);
    let b = Broadcast::new(&content, PACKET_SIZE);

    let mut frames = b.clean_frames();
    // Would be a gap if it were ever looked at.
    let stray = make_packet(40, &[0; 58], PACKET_SIZE).unwrap();
    frames.push(packet_frame(&stray));
    frames.push(blank_frame());

    let summary = receive_frames(frames, &output).unwrap();
    assert_eq!(fs::read(&output).unwrap(), content);
    assert_eq!(summary.frames_read, 4);
}

#[test]
fn test_single_packet_file() {
    let dir = TestDir::new("single");
    let output = dir.join("received.bin");
    let content = b"short message".to_vec();
    let b = Broadcast::new(&content, PACKET_SIZE);
    assert_eq!(b.packets.len(), 1);

    receive_frames(b.clean_frames(), &output).unwrap();
    assert_eq!(fs::read(&output).unwrap(), content);
}

#[test]
fn test_exact_multiple_of_block_size() {
    let dir = TestDir::new("exact");
    let output = dir.join("received.bin");
    let content = test_content(58 * 3);
    let b = Broadcast::new(&content, PACKET_SIZE);
    assert_eq!(b.packets.len(), 3);
    assert_eq!(b.packets[2].len(), usize::from(PACKET_SIZE));

    receive_frames(b.clean_frames(), &output).unwrap();
    assert_eq!(fs::read(&output).unwrap(), content);
}

#[test]
fn test_empty_file_needs_only_the_header() {
    let dir = TestDir::new("empty");
    let output = dir.join("received.bin");
    let b = Broadcast::new(b"", PACKET_SIZE);
    assert!(b.packets.is_empty());

    let summary = receive_frames(vec![blank_frame(), b.header_frame()], &output).unwrap();
    assert_eq!(fs::read(&output).unwrap(), b"");
    assert_eq!(summary.packets, 0);
}

#[test]
fn test_deeper_queue_gives_same_result() {
    let dir = TestDir::new("deep-queue");
    let output = dir.join("received.bin");
    let content = test_content(2_000);
    let b = Broadcast::new(&content, PACKET_SIZE);

    let options = TransferOptions {
        queue_capacity: 8,
        ..TransferOptions::new(&output)
    };
    receive(ScriptedSource::new(b.clean_frames()), &plane_decoder, &options, |_| {}).unwrap();
    assert_eq!(fs::read(&output).unwrap(), content);
}

#[test]
fn test_overwrite_replaces_existing_output() {
    let dir = TestDir::new("overwrite");
    let output = dir.join("received.bin");
    fs::write(&output, b"stale").unwrap();
    let content = test_content(200);
    let b = Broadcast::new(&content, PACKET_SIZE);

    let options = TransferOptions {
        overwrite: true,
        ..TransferOptions::new(&output)
    };
    receive(ScriptedSource::new(b.clean_frames()), &plane_decoder, &options, |_| {}).unwrap();
    assert_eq!(fs::read(&output).unwrap(), content);
}

#[test]
fn test_custom_temp_suffix() {
    let dir = TestDir::new("suffix");
    let output = dir.join("received.bin");
    let content = test_content(200);
    let b = Broadcast::new(&content, PACKET_SIZE);

    let options = TransferOptions {
        temp_suffix: ".part".into(),
        ..TransferOptions::new(&output)
    };
    assert_eq!(options.temp_path(), dir.join("received.bin.part"));
    receive(ScriptedSource::new(b.clean_frames()), &plane_decoder, &options, |_| {}).unwrap();
    assert!(!options.temp_path().exists());
    assert_eq!(fs::read(&output).unwrap(), content);
}

#[test]
fn test_progress_walks_through_phases() {
    let dir = TestDir::new("progress");
    let output = dir.join("received.bin");
    let content = test_content(150);
    let b = Broadcast::new(&content, PACKET_SIZE);

    let mut frames = vec![blank_frame()];
    frames.extend(b.clean_frames());
    let mut seen: Vec<Progress> = Vec::new();
    receive(
        ScriptedSource::new(frames),
        &plane_decoder,
        &TransferOptions::new(&output),
        |p| seen.push(*p),
    )
    .unwrap();

    let phases: Vec<Phase> = seen.iter().map(|p| p.phase).collect();
    assert_eq!(
        phases,
        vec![
            Phase::SeekingHeader,
            Phase::SeekingHeader,
            Phase::Receiving,
            Phase::Receiving,
            Phase::Receiving,
            Phase::Complete,
        ]
    );
    assert!(seen.iter().all(|p| p.frame_count == Some(5)));
    assert_eq!(seen[2].packet, 0);
    assert_eq!(seen[4].packet, 2);
    assert_eq!(seen[4].packet_count, 3);

    let last = seen.last().unwrap();
    assert_eq!((last.frame, last.packet, last.packet_count), (5, 3, 3));
}
