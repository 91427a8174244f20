mod support;

mod csum;
