/// SVG serialization of a rendered frame.
///
/// Gradients and glow filters are hoisted into `<defs>`; identical glows
/// share one filter.

use std::fmt::Write;

use super::scene::{Glow, Paint, Rgba, Shape, TextAlign};
use super::Frame;

pub fn render_frame(frame: &Frame) -> String {
    let (w, h) = (frame.viewport.width, frame.viewport.height);
    let mut defs = String::new();
    let mut body = String::new();
    let mut glows: Vec<Glow> = Vec::new();
    let mut gradient_count = 0usize;

    for shape in frame.scene.shapes() {
        match shape {
            Shape::Rect { x, y, width, height, fill } => {
                let _ = write!(
                    body,
                    r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" {}/>"#,
                    x, y, width, height, fill_attrs(fill)
                );
            }
            Shape::Line { from, to, stroke, width } => {
                let stroke_attrs = match stroke {
                    Paint::Solid(c) => color_attrs("stroke", c),
                    Paint::Linear { from: g0, to: g1, stops } => {
                        gradient_count += 1;
                        let id = format!("edge{}", gradient_count);
                        let _ = write!(
                            defs,
                            r#"<linearGradient id="{}" gradientUnits="userSpaceOnUse" x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}">"#,
                            id, g0.x, g0.y, g1.x, g1.y
                        );
                        for stop in stops {
                            let _ = write!(
                                defs,
                                r#"<stop offset="{}" stop-color="{}" stop-opacity="{:.3}"/>"#,
                                stop.offset, stop.color.css_rgb(), stop.color.a
                            );
                        }
                        defs.push_str("</linearGradient>");
                        format!(r#"stroke="url(#{})""#, id)
                    }
                };
                let _ = write!(
                    body,
                    r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" {} stroke-width="{:.2}" stroke-linecap="round"/>"#,
                    from.x, from.y, to.x, to.y, stroke_attrs, width
                );
            }
            Shape::Circle { center, radius, fill, stroke, stroke_width, glow } => {
                if let Some(g) = glow {
                    let idx = match glows.iter().position(|known| known == g) {
                        Some(i) => i,
                        None => {
                            glows.push(*g);
                            let _ = write!(
                                defs,
                                r#"<filter id="glow{}" x="-150%" y="-150%" width="400%" height="400%"><feDropShadow dx="0" dy="0" stdDeviation="{:.2}" flood-color="{}" flood-opacity="{:.3}"/></filter>"#,
                                glows.len() - 1, g.blur / 2.0, g.color.css_rgb(), g.color.a
                            );
                            glows.len() - 1
                        }
                    };
                    let _ = write!(
                        body,
                        r#"<circle cx="{:.2}" cy="{:.2}" r="{:.2}" {} filter="url(#glow{})"/>"#,
                        center.x, center.y, radius, fill_attrs(fill), idx
                    );
                }
                let _ = write!(
                    body,
                    r#"<circle cx="{:.2}" cy="{:.2}" r="{:.2}" {} {} stroke-width="{:.2}"/>"#,
                    center.x, center.y, radius, fill_attrs(fill), color_attrs("stroke", stroke), stroke_width
                );
            }
            Shape::Text { at, text, style } => {
                let anchor = match style.align {
                    TextAlign::Start => "start",
                    TextAlign::Center => "middle",
                };
                let _ = write!(
                    body,
                    r#"<text x="{:.2}" y="{:.2}" text-anchor="{}" dominant-baseline="middle" font-family="{}" font-size="{:.1}" font-weight="{}" {}>{}</text>"#,
                    at.x, at.y, anchor, escape(style.family), style.size, style.weight, fill_attrs(&style.color), escape(text)
                );
            }
        }
    }

    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w:.0}" height="{h:.0}" viewBox="0 0 {w:.2} {h:.2}" data-backing="{bw}x{bh}" data-scale="{scale}"><defs>{defs}</defs>{body}</svg>"#,
        w = w, h = h, bw = frame.backing_width, bh = frame.backing_height, scale = frame.scale, defs = defs, body = body
    )
}

fn color_attrs(attr: &str, c: &Rgba) -> String {
    if c.a >= 1.0 {
        format!(r#"{}="{}""#, attr, c.css_rgb())
    } else {
        format!(r#"{attr}="{}" {attr}-opacity="{:.3}""#, c.css_rgb(), c.a, attr = attr)
    }
}

fn fill_attrs(c: &Rgba) -> String {
    color_attrs("fill", c)
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
