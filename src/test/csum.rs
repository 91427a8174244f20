use crate::buf::FrameBuf;
use crate::csum;
use crate::hdr::{Dissection, NetHdr, dissect};

use super::support::{self, Tcp4Frame, Tcp6Frame};

fn headers(buf: &FrameBuf) -> crate::hdr::Headers {
    match dissect(buf).expect("dissect") {
        Dissection::Headers(h) => h,
        Dissection::Done(v) => panic!("unexpected early verdict {v:?}"),
    }
}

#[test]
fn fold_known_values() {
    assert_eq!(csum::fold(0), 0xffff);
    assert_eq!(csum::fold(0x0001_0001), 0xfffd);
    // A sum of 0xffff folds to zero: the all-ones checksum result.
    assert_eq!(csum::fold(0xffff), 0);
}

#[test]
fn sum_range_pads_odd_trailing_byte_high() {
    let buf = FrameBuf::with_headroom(&[0x12, 0x34, 0x56], 0);
    assert_eq!(csum::sum_range(&buf, 0, 3).expect("sum"), 0x1234 + 0x5600);
    assert!(csum::sum_range(&buf, 1, 3).is_err());
}

#[test]
fn built_ipv4_frame_verifies_clean() {
    let buf = Tcp4Frame::default().to_buf();
    let hdr = headers(&buf);
    let NetHdr::V4(ip) = hdr.net else {
        panic!("expected v4")
    };
    assert!(csum::verify_ipv4_header(&buf, &ip).expect("verify ip"));
    assert!(csum::verify_tcp(&buf, &hdr.net, &hdr.tcp, hdr.tcp_len).expect("verify tcp"));
}

#[test]
fn corrupted_checksums_fail_verification() {
    let mut frame = Tcp4Frame::default().build();
    frame[18] ^= 0x01; // ip id
    let buf = FrameBuf::with_headroom(&frame, 0);
    let hdr = headers(&buf);
    let NetHdr::V4(ip) = hdr.net else {
        panic!("expected v4")
    };
    assert!(!csum::verify_ipv4_header(&buf, &ip).expect("verify ip"));

    let mut frame = Tcp4Frame::default().build();
    frame[38] ^= 0x01; // tcp seq
    let buf = FrameBuf::with_headroom(&frame, 0);
    let hdr = headers(&buf);
    assert!(!csum::verify_tcp(&buf, &hdr.net, &hdr.tcp, hdr.tcp_len).expect("verify tcp"));
}

#[test]
fn built_ipv6_frame_verifies_clean() {
    let buf = Tcp6Frame::default().to_buf();
    let hdr = headers(&buf);
    assert!(matches!(hdr.net, NetHdr::V6(_)));
    assert!(csum::verify_tcp(&buf, &hdr.net, &hdr.tcp, hdr.tcp_len).expect("verify tcp"));
}

#[test]
fn finalize_recomputes_from_scratch() {
    // Start from a frame with deliberately wrong checksums.
    let mut frame = Tcp4Frame::default().build();
    frame[24] = 0xaa; // ip checksum
    frame[25] = 0x55;
    frame[50] = 0xaa; // tcp checksum
    frame[51] = 0x55;
    let mut buf = FrameBuf::with_headroom(&frame, 0);
    let hdr = headers(&buf);
    let NetHdr::V4(ip) = hdr.net else {
        panic!("expected v4")
    };

    csum::finalize_tcp(&mut buf, &hdr.net, &hdr.tcp, hdr.tcp_len).expect("finalize tcp");
    csum::finalize_ipv4_header(&mut buf, &ip).expect("finalize ip");

    assert!(csum::verify_ipv4_header(&buf, &ip).expect("verify ip"));
    assert!(csum::verify_tcp(&buf, &hdr.net, &hdr.tcp, hdr.tcp_len).expect("verify tcp"));

    // Cross-check against the independent reference implementation.
    let out = buf.as_bytes();
    assert_eq!(support::ones_complement(&out[14..34], 0), 0);
    let pseudo = support::pseudo_v4(support::CLIENT_IP, support::SERVER_IP, hdr.tcp_len as u32);
    assert_eq!(support::ones_complement(&out[34..34 + hdr.tcp_len], pseudo), 0);
}
