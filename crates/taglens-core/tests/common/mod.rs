//! Byte-level fixture builders shared by the integration tests

#![allow(dead_code)]

use taglens_core::decode::encode_synchsafe;

pub fn riff_chunk(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    out
}

pub fn fmt_payload(format: u16, channels: u16, rate: u32, bits: u16) -> Vec<u8> {
    let block_align = channels * (bits / 8);
    let mut out = format.to_le_bytes().to_vec();
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&rate.to_le_bytes());
    out.extend_from_slice(&(rate * u32::from(block_align)).to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits.to_le_bytes());
    out
}

pub fn wav(format: u16, data_len: usize) -> Vec<u8> {
    let mut body = b"WAVE".to_vec();
    body.extend(riff_chunk(b"fmt ", &fmt_payload(format, 2, 44100, 16)));
    body.extend(riff_chunk(b"data", &vec![0u8; data_len]));
    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend(body);
    out
}

pub fn id3_frame(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(payload);
    out
}

pub fn id3_tag(frames: &[Vec<u8>]) -> Vec<u8> {
    let body = frames.concat();
    let mut out = b"ID3\x03\x00\x00".to_vec();
    out.extend_from_slice(&encode_synchsafe(body.len() as u32));
    out.extend(body);
    out
}

/// MPEG-1 Layer III, 128 kbps, 44.1 kHz, joint stereo
pub const MPEG_FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x44];

pub fn mp3(title: &str) -> Vec<u8> {
    let mut text = vec![3u8];
    text.extend_from_slice(title.as_bytes());
    let mut out = id3_tag(&[id3_frame(b"TIT2", &text)]);
    out.extend_from_slice(&MPEG_FRAME_HEADER);
    out.extend(vec![0u8; 413]);
    out
}

pub fn streaminfo(sample_rate: u32, channels: u8, bits: u8, total: u32) -> Vec<u8> {
    let mut p = vec![0u8; 34];
    p[0..2].copy_from_slice(&4096u16.to_be_bytes());
    p[2..4].copy_from_slice(&4096u16.to_be_bytes());
    p[10] = (sample_rate >> 12) as u8;
    p[11] = (sample_rate >> 4) as u8;
    p[12] = ((sample_rate & 0x0F) as u8) << 4 | (channels - 1) << 1 | (bits - 1) >> 4;
    p[13] = ((bits - 1) & 0x0F) << 4;
    p[14..18].copy_from_slice(&total.to_be_bytes());
    p
}

pub fn flac_block(code: u8, last: bool, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![code | if last { 0x80 } else { 0 }];
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(payload);
    out
}

pub fn comment_block(vendor: &str, entries: &[&str]) -> Vec<u8> {
    let mut out = (vendor.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(vendor.as_bytes());
    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for entry in entries {
        out.extend_from_slice(&(entry.len() as u32).to_le_bytes());
        out.extend_from_slice(entry.as_bytes());
    }
    out
}

pub fn flac(comments: &[&str]) -> Vec<u8> {
    let mut out = b"fLaC".to_vec();
    out.extend(flac_block(0, false, &streaminfo(44100, 2, 16, 88200)));
    out.extend(flac_block(4, true, &comment_block("taglens", comments)));
    out
}

pub fn ogg_page(packet: &[u8]) -> Vec<u8> {
    let mut out = b"OggS\0\x02".to_vec();
    out.extend_from_slice(&[0u8; 20]);
    out.push(1);
    out.push(packet.len().min(255) as u8);
    out.extend_from_slice(packet);
    out
}

pub fn opus(channels: u8, rate: u32) -> Vec<u8> {
    let mut head = b"OpusHead".to_vec();
    head.push(1);
    head.push(channels);
    head.extend_from_slice(&312u16.to_le_bytes());
    head.extend_from_slice(&rate.to_le_bytes());
    head.extend_from_slice(&0i16.to_le_bytes());
    head.push(0);

    let mut tags = b"OpusTags".to_vec();
    tags.extend(comment_block("libopus 1.4", &["TITLE=Night", "artist=Somebody"]));
    [ogg_page(&head), ogg_page(&tags)].concat()
}

/// Every fixture with a recognizable signature
pub fn all_fixtures() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("wav", wav(1, 64)),
        ("mp3", mp3("Test Title")),
        ("flac", flac(&["TITLE=Song", "ARTIST=Band"])),
        ("opus", opus(2, 48000)),
    ]
}
