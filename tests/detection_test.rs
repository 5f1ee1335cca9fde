//! Star detection on synthetic skies: the line-endpoint strategy on a drawn
//! constellation, the brightness fallbacks on bare star fields, and the
//! degenerate images that must come back empty.

mod synthetic_sky;

use image::{DynamicImage, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use constellation::{DetectionConfig, DetectionMethod, StarDetector};
use synthetic_sky::{constellation_sky, nearest_true_star, starfield, TrueStar};

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
}

#[test]
fn test_line_endpoints_find_constellation() {
    init_logging();

    // ── Step 1: Draw five stars joined by lines ──
    let (img, truth) = constellation_sky(7);
    let detector = StarDetector::default();

    // ── Step 2: Detect ──
    let result = detector.detect(&img, truth.len());
    println!(
        "method={} degraded={} stars={} attempts={:?} ({:.1} ms)",
        result.method,
        result.degraded,
        result.stars.len(),
        result.attempts,
        result.elapsed_ms
    );

    // ── Step 3: Check against the drawn stars ──
    assert_eq!(result.method, DetectionMethod::LineEndpoints);
    assert!(!result.degraded);
    assert!(result.stars.len() >= 3, "found only {}", result.stars.len());
    assert!(result.stars.len() <= truth.len());
    for s in &result.stars {
        let d = nearest_true_star(s.x, s.y, &truth);
        println!("  star ({}, {}) b={} off by {:.2} px", s.x, s.y, s.brightness, d);
        assert!(d <= 3.0, "detection ({}, {}) is {:.1} px from any star", s.x, s.y, d);
        assert!(s.brightness >= 180);
    }
    assert_eq!((result.image_width, result.image_height), (512, 512));
}

#[test]
fn test_bare_starfield_falls_back_to_threshold() {
    init_logging();

    let truth = vec![
        TrueStar { x: 60.0, y: 60.0, peak: 250 },
        TrueStar { x: 190.0, y: 80.0, peak: 245 },
        TrueStar { x: 100.0, y: 190.0, peak: 240 },
        TrueStar { x: 200.0, y: 200.0, peak: 235 },
    ];
    let img = starfield(256, 256, &truth, 11);
    let result = StarDetector::default().detect(&img, truth.len());

    assert_eq!(result.method, DetectionMethod::BrightnessThreshold(200));
    assert!(result.degraded);
    assert_eq!(result.attempts[0].method, DetectionMethod::LineEndpoints);
    assert_eq!(result.attempts[0].candidates, 0);
    assert_eq!(result.stars.len(), truth.len());

    // Brightest first, matching the drawn peaks
    let brightness: Vec<u8> = result.stars.iter().map(|s| s.brightness).collect();
    assert_eq!(brightness, vec![250, 245, 240, 235]);
    for s in &result.stars {
        assert!(nearest_true_star(s.x, s.y, &truth) <= 1.5);
    }
}

#[test]
fn test_dim_stars_need_lowest_threshold() {
    init_logging();

    let truth = vec![
        TrueStar { x: 50.0, y: 50.0, peak: 160 },
        TrueStar { x: 150.0, y: 60.0, peak: 165 },
        TrueStar { x: 90.0, y: 150.0, peak: 162 },
    ];
    let img = starfield(200, 200, &truth, 3);
    let result = StarDetector::default().detect(&img, truth.len());

    assert_eq!(result.method, DetectionMethod::BrightnessThreshold(140));
    let tried: Vec<DetectionMethod> = result.attempts.iter().map(|a| a.method).collect();
    assert_eq!(
        tried,
        vec![
            DetectionMethod::LineEndpoints,
            DetectionMethod::BrightnessThreshold(200),
            DetectionMethod::BrightnessThreshold(170),
            DetectionMethod::BrightnessThreshold(140),
        ]
    );
    assert_eq!(result.stars.len(), 3);
}

#[test]
fn test_close_pair_reported_once() {
    init_logging();

    let truth = vec![
        TrueStar { x: 100.0, y: 100.0, peak: 250 },
        TrueStar { x: 108.0, y: 100.0, peak: 230 },
    ];
    let img = starfield(200, 200, &truth, 5);
    let result = StarDetector::default().detect(&img, 1);

    assert_eq!(result.stars.len(), 1);
    let s = &result.stars[0];
    assert_eq!(s.brightness, 250);
    assert!((100..=108).contains(&s.x), "merged x = {}", s.x);
}

#[test]
fn test_degenerate_images_are_empty() {
    init_logging();
    let detector = StarDetector::default();

    let black = DynamicImage::ImageRgb8(RgbImage::new(128, 128));
    let result = detector.detect(&black, 5);
    assert!(result.stars.is_empty());
    assert_eq!(result.attempts.len(), 4);
    assert!(result.attempts.iter().all(|a| a.candidates == 0));

    let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(128, 128, image::Rgb([255, 255, 255])));
    assert!(detector.detect(&white, 5).stars.is_empty());

    let tiny = DynamicImage::ImageRgb8(RgbImage::new(2, 2));
    assert!(detector.detect(&tiny, 1).stars.is_empty());
}

#[test]
fn test_random_starfields_respect_invariants() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(42);
    let config = DetectionConfig {
        max_stars: 8,
        ..DetectionConfig::default()
    };
    let detector = StarDetector::new(config.clone());

    for trial in 0..6 {
        let n = rng.gen_range(3..12);
        let truth: Vec<TrueStar> = (0..n)
            .map(|_| TrueStar {
                x: rng.gen_range(10.0..246.0),
                y: rng.gen_range(10.0..246.0),
                peak: rng.gen_range(215..=255),
            })
            .collect();
        let img = starfield(256, 256, &truth, trial);
        let result = detector.detect(&img, n);
        println!("trial {}: {} drawn, {} detected via {}", trial, n, result.stars.len(), result.method);

        assert!(result.stars.len() <= config.max_stars);
        for pair in result.stars.windows(2) {
            assert!(pair[0].brightness >= pair[1].brightness);
        }
        for (i, a) in result.stars.iter().enumerate() {
            for b in &result.stars[i + 1..] {
                assert!(a.distance_to(b) > config.cluster_radius);
            }
            assert!(a.x < 256 && a.y < 256);
        }
    }
}
